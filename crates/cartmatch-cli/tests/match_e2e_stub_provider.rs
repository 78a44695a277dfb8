use axum::{routing::post, Json, Router};
use cartmatch_local::{analyzer, reranker, scoring};
use std::net::SocketAddr;
use std::path::Path;

fn reply(content: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "choices": [ { "message": { "role": "assistant", "content": content.to_string() } } ]
    }))
}

/// OpenAI-compatible stub that answers by stage (picked from the system prompt).
async fn serve_stub() -> SocketAddr {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<serde_json::Value>| async move {
            let system = body["messages"][0]["content"].as_str().unwrap_or("");
            if system == analyzer::SYSTEM_PROMPT {
                reply(serde_json::json!({ "subject": "cipster", "modifiers": [] }))
            } else if system == reranker::SYSTEM_PROMPT {
                reply(serde_json::json!({ "product_ids": ["p2", "gone", "p1", "p3"] }))
            } else if system == scoring::SEMANTIC_SYSTEM_PROMPT {
                reply(serde_json::json!({ "confidence": 90, "reasoning": "same snack" }))
            } else {
                reply(serde_json::json!({}))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn write_catalog(dir: &Path) {
    let entry = |id: &str, nome: &str, marca: Option<&str>| {
        serde_json::json!({ "product_details": {
            "id": id, "nome": nome, "marca": marca, "categoria": "Snack salati"
        }})
    };
    let products = serde_json::json!({
        "p1": entry("p1", "Patatine classiche", Some("San Carlo")),
        "p2": entry("p2", "Patatine paprika", Some("Amica Chips")),
        "p3": entry("p3", "Chips di mais", None),
        "l1": { "product_details": { "id": "l1", "nome": "Latte intero", "prezzo": 1.29 } }
    });
    std::fs::write(dir.join("products_by_id.json"), products.to_string()).unwrap();
}

async fn run_match(dir: &Path, addr: SocketAddr, extra: &[&str]) -> serde_json::Value {
    let bin = assert_cmd::cargo::cargo_bin!("cartmatch");
    let mut cmd = std::process::Command::new(bin);
    cmd.arg("--catalog-dir")
        .arg(dir)
        .args(extra)
        .env_remove("CARTMATCH_ENV_FILE")
        .env_remove("CARTMATCH_AI_PROVIDER")
        .env_remove("CARTMATCH_SEMANTIC_SCORING")
        .env_remove("CARTMATCH_SYNONYMS_PATH")
        .env_remove("CARTMATCH_OLLAMA_ENABLE")
        .env("CARTMATCH_OPENAI_COMPAT_BASE_URL", format!("http://{addr}"))
        .env("CARTMATCH_OPENAI_COMPAT_MODEL", "stub")
        .env("CARTMATCH_LLM_TIMEOUT_MS", "5000");
    let out = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .expect("run cartmatch match");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout is json")
}

fn ids(v: &serde_json::Value) -> Vec<String> {
    v.as_array()
        .unwrap()
        .iter()
        .map(|m| m["productId"].as_str().unwrap_or("").to_string())
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn match_runs_the_whole_pipeline_against_a_stub_provider() {
    let tmp = tempfile::tempdir().unwrap();
    write_catalog(tmp.path());
    let addr = serve_stub().await;

    let v = run_match(tmp.path(), addr, &["match", "--platform", "esselunga", "cipster"]).await;
    // "gone" is not in the catalog and is skipped.
    assert_eq!(ids(&v), vec!["p2", "p1"]);
    let first = &v[0];
    assert_eq!(first["originalItem"], "cipster");
    assert_eq!(first["matchedProduct"], "Patatine paprika");
    assert_eq!(first["platform"], "esselunga");
    assert_eq!(first["price"].as_f64(), Some(3.5));
    assert!(first["productUrl"]
        .as_str()
        .unwrap()
        .starts_with("https://spesaonline.esselunga.it/"));
    for m in v.as_array().unwrap() {
        let c = m["confidence"].as_f64().unwrap();
        assert!((0.70..=0.95).contains(&c), "{c}");
    }

    let next = run_match(tmp.path(), addr, &["match", "--skip", "3", "cipster"]).await;
    assert_eq!(ids(&next), vec!["p3"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn semantic_scoring_flag_uses_the_model_score() {
    let tmp = tempfile::tempdir().unwrap();
    write_catalog(tmp.path());
    let addr = serve_stub().await;

    let v = run_match(
        tmp.path(),
        addr,
        &["--semantic-scoring", "true", "match", "--page-size", "1", "cipster"],
    )
    .await;
    assert_eq!(ids(&v), vec!["p2"]);
    assert_eq!(v[0]["confidence"].as_f64(), Some(0.9));
}
