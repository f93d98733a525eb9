use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::Router;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Serve an axum router on an ephemeral local port.
pub async fn spawn_app(app: Router) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

/// A small but realistic catalog payload.
pub fn sample_products() -> Value {
    json!([
        {"name": "Laptop", "category": "Electronics", "description": "Portable computer", "price": 999.99, "stock": 12},
        {"name": "Mug", "category": "Kitchenware", "description": "Ceramic mug", "price": 7.5, "stock": 100},
        {"name": "Novel", "category": "Books", "description": "Paperback", "price": 12.0, "stock": 31},
    ])
}

/// Counts requests across handler invocations.
#[derive(Clone, Default)]
pub struct Hits(pub Arc<AtomicU32>);

impl Hits {
    pub fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}
