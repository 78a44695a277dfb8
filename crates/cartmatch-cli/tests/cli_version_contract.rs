#[test]
fn cartmatch_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("cartmatch");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .env_remove("CARTMATCH_ENV_FILE")
        .output()
        .expect("run cartmatch version");

    assert!(out.status.success(), "cartmatch version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["name"].as_str(), Some("cartmatch"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}
