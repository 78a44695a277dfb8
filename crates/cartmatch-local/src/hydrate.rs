//! Turning a catalog product into an `EcommerceMatch`: fills in what the snapshot lacks
//! (price estimate, storefront URLs) deterministically.

use cartmatch_core::{CatalogProduct, EcommerceMatch};
use url::Url;

/// Keyword → flat price (EUR), first hit wins. Matched against `category + name`.
const PRICE_TABLE: &[(&[&str], f64)] = &[
    (
        &[
            "carne", "manzo", "pollo", "maiale", "vitello", "meat", "beef", "chicken",
        ],
        8.50,
    ),
    (&["formaggio", "parmigiano", "mozzarella", "cheese"], 12.00),
    (&["pasta", "spaghetti", "penne", "fusilli"], 1.20),
    (&["latte", "milk"], 1.30),
    (&["pane", "bread"], 2.50),
];

pub const DEFAULT_PRICE: f64 = 3.50;

pub fn estimate_price(name: &str, category: Option<&str>) -> f64 {
    let text = format!("{} {}", category.unwrap_or(""), name).to_lowercase();
    PRICE_TABLE
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_PRICE)
}

/// Lower-case, ASCII alphanumerics and `-` only; never empty.
fn platform_slug(platform: &str) -> String {
    let s: String = platform
        .trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if s.is_empty() {
        "shop".to_string()
    } else {
        s
    }
}

/// `base` + one percent-encoded path segment.
fn with_segment(base: &str, segment: &str) -> String {
    match Url::parse(base) {
        Ok(mut u) => {
            if let Ok(mut segs) = u.path_segments_mut() {
                segs.pop_if_empty().push(segment);
            }
            u.to_string()
        }
        Err(_) => format!("{}/{segment}", base.trim_end_matches('/')),
    }
}

fn url_bases(platform: &str) -> (String, String) {
    match platform_slug(platform).as_str() {
        "carrefour" => (
            "https://www.carrefour.it/p/".to_string(),
            "https://static.carrefour.it/images/products/".to_string(),
        ),
        "esselunga" => (
            "https://spesaonline.esselunga.it/commerce/nav/supermercato/store/prodotto/"
                .to_string(),
            "https://images.esselunga.it/imagesbank/esselunga/".to_string(),
        ),
        "amazon" => (
            "https://www.amazon.it/dp/".to_string(),
            "https://m.media-amazon.com/images/P/".to_string(),
        ),
        other => (
            format!("https://www.{other}.com/product/"),
            format!("https://www.{other}.com/images/"),
        ),
    }
}

pub fn product_url(platform: &str, id: &str) -> String {
    with_segment(&url_bases(platform).0, id)
}

pub fn image_url(platform: &str, id: &str) -> String {
    with_segment(&url_bases(platform).1, &format!("{id}.jpg"))
}

pub fn to_match(
    original_item: &str,
    platform: &str,
    product: &CatalogProduct,
    confidence: f64,
) -> EcommerceMatch {
    let category = product.category_str();
    EcommerceMatch {
        original_item: original_item.to_string(),
        matched_product: product.name.clone(),
        brand: product.brand_str().map(str::to_string),
        category: category.map(str::to_string),
        price: product
            .price
            .filter(|p| *p > 0.0)
            .unwrap_or_else(|| estimate_price(&product.name, category)),
        description: product.sales_description.clone(),
        image_url: product
            .image_url
            .clone()
            .unwrap_or_else(|| image_url(platform, &product.id)),
        product_url: product
            .product_url
            .clone()
            .unwrap_or_else(|| self::product_url(platform, &product.id)),
        confidence,
        product_id: Some(product.id.clone()),
        platform: platform.trim().to_string(),
    }
}
