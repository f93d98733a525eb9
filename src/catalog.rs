//! Shared view of the product catalog.
//!
//! Every virtual user reads and refreshes the same catalog.  A single mutex
//! guards the product vector and the accumulated category set as one unit, so
//! a reader never pairs products from one refresh with categories from a
//! half-applied one.  Categories only accumulate across refreshes; the set of
//! categories observed can therefore be a superset of what the current
//! product vector alone would produce.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::seq::{IteratorRandom, SliceRandom};

use crate::Product;

#[derive(Default)]
struct Inner {
    products: Vec<Product>,
    categories: HashSet<String>,
}

/// Cloneable handle to the process-wide catalog.  Clones share state; inject
/// one clone into every worker at construction.
#[derive(Clone, Default)]
pub struct SharedCatalog {
    inner: Arc<Mutex<Inner>>,
}

impl SharedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Nothing here holds the lock across a panic point worth preserving;
        // recover the data rather than poisoning every other worker.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a freshly fetched product list.  The vector is replaced
    /// atomically; categories are unioned in and never purged, so a later
    /// listing that omits a category leaves it visible.
    pub fn replace_products(&self, products: Vec<Product>) {
        let mut inner = self.lock();
        for product in &products {
            match product.category.as_deref() {
                Some(category) if !category.is_empty() => {
                    inner.categories.insert(category.to_string());
                }
                _ => {}
            }
        }
        inner.products = products;
        tracing::debug!(
            products = inner.products.len(),
            categories = inner.categories.len(),
            "catalog replaced"
        );
    }

    /// Defensive copy of the current products, in listing order.
    pub fn all_products(&self) -> Vec<Product> {
        self.lock().products.clone()
    }

    /// Uniform-random product, or `None` while the catalog is empty.
    pub fn random_product(&self) -> Option<Product> {
        self.lock().products.choose(&mut rand::thread_rng()).cloned()
    }

    /// Linear scan by name; first match wins.  Names are expected to be
    /// unique but this is not enforced.
    pub fn product_by_name(&self, name: &str) -> Option<Product> {
        self.lock().products.iter().find(|p| p.name == name).cloned()
    }

    /// Defensive copy of every category observed so far.
    pub fn all_categories(&self) -> HashSet<String> {
        self.lock().categories.clone()
    }

    pub fn random_category(&self) -> Option<String> {
        self.lock()
            .categories
            .iter()
            .choose(&mut rand::thread_rng())
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().products.len()
    }
}
