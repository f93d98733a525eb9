//! Core library for storesim.  This crate wires together the pieces that
//! drive each virtual user: a shared catalog of observed products, composable
//! response validation, a retrying HTTP executor and the weighted action
//! scheduler.  The target product service is an opaque external collaborator;
//! everything here treats it as a black box reachable over HTTP.

mod config;
pub mod actions;
pub mod catalog;
pub mod driver;
pub mod executor;
pub mod scheduler;
pub mod service;
pub mod stats;
pub mod validate;
pub mod wire;

pub use config::{PacingMode, SimConfig};

use serde::{Deserialize, Serialize};

/// One catalog entry as observed from the target service.
///
/// `name` is the natural key: the service's mutation endpoints (buy, stock
/// update, details) all address products by name, so the simulator does the
/// same.  A product is created when it first appears in a listing response
/// and superseded wholesale by the next successful catalog refresh; there is
/// no per-field merge.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    /// Fields the service returns that the simulator does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
