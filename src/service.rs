//! Typed surface of the product service under test.
//!
//! Thin wrapper over a pooled `reqwest::Client`: one method per logical
//! endpoint, each returning the raw response future so the executor can
//! re-issue it on retry.  Response interpretation lives elsewhere.

use std::time::Duration;

use serde_json::json;

/// Handle to the target service.  Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct ProductService {
    client: reqwest::Client,
    base_url: String,
}

impl ProductService {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub async fn list_products(&self) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url("products")).send().await
    }

    pub async fn list_by_category(&self, category: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(self.url("products/category"))
            .query(&[("category", category)])
            .send()
            .await
    }

    /// Details are looked up by name via POST; the service has no by-id GET.
    pub async fn product_details(&self, name: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url("products/details"))
            .json(&json!({ "name": name }))
            .send()
            .await
    }

    pub async fn buy_product(&self, name: &str, quantity: u32) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(self.url("products/buy"))
            .json(&json!({ "name": name, "quantity": quantity }))
            .send()
            .await
    }

    pub async fn update_stock(&self, name: &str, stock: i64) -> reqwest::Result<reqwest::Response> {
        self.client
            .patch(self.url("products/stock"))
            .json(&json!({ "name": name, "stock": stock }))
            .send()
            .await
    }

    pub async fn health_check(&self) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url("health")).send().await
    }

    /// Hit a path that cannot exist, to exercise the service's 404 handling.
    pub async fn invalid_path(&self) -> reqwest::Result<reqwest::Response> {
        let path = format!("some/invalid/path/{:016x}", rand::random::<u64>());
        self.client.get(self.url(&path)).send().await
    }
}
