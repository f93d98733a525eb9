//! The loop each virtual user runs.
//!
//! A worker owns its scheduler, counters and RNG; only the catalog and the
//! run statistics are shared.  Startup seeds the catalog with a bounded
//! retry loop of its own, then the steady state iterates: select, generate
//! arguments, execute with retries, update shared state, pace.  No single
//! action failure ever terminates the run.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::actions::{self, ActionArgs, ActionDescriptor, ActionKind, ArgOutcome};
use crate::catalog::SharedCatalog;
use crate::executor::{execute_with_retry, Exchange, RetryPolicy};
use crate::scheduler::{Scheduler, Selection};
use crate::service::ProductService;
use crate::stats::RunStats;
use crate::wire;

const INITIAL_FETCH_ATTEMPTS: u32 = 5;

pub struct Worker {
    id: usize,
    service: ProductService,
    catalog: SharedCatalog,
    scheduler: Scheduler,
    stats: Arc<RunStats>,
    policy: RetryPolicy,
    pace: Duration,
    rng: StdRng,
}

impl Worker {
    pub fn new(
        id: usize,
        service: ProductService,
        catalog: SharedCatalog,
        actions: Vec<ActionDescriptor>,
        stats: Arc<RunStats>,
        policy: RetryPolicy,
        pace: Duration,
    ) -> Self {
        Self {
            id,
            service,
            catalog,
            scheduler: Scheduler::new(actions),
            stats,
            policy,
            pace,
            rng: StdRng::from_entropy(),
        }
    }

    /// Run until the shutdown signal flips.  In-flight requests are allowed
    /// to finish or hit their own timeout; nothing is forcibly cancelled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.initial_fetch(&mut shutdown).await;

        loop {
            if *shutdown.borrow() {
                break;
            }
            let kind = match self.scheduler.select(self.catalog.is_empty()) {
                Selection::Run(kind) => kind,
                Selection::Stall => {
                    self.stats.record_stall();
                    tracing::warn!(worker = self.id, "no runnable action, backing off");
                    if wait_or_shutdown(&mut shutdown, self.pace * 5).await {
                        break;
                    }
                    continue;
                }
            };

            let args = match actions::generate_args(kind, &self.catalog, &mut self.rng) {
                ArgOutcome::Args(args) => args,
                ArgOutcome::Abstain => {
                    // Catalog emptied out between selection and generation;
                    // skip this iteration without counting it.
                    self.stats.record_abstain();
                    tracing::debug!(worker = self.id, action = kind.name(), "generator abstained");
                    if wait_or_shutdown(&mut shutdown, Duration::from_millis(100)).await {
                        break;
                    }
                    continue;
                }
            };

            self.scheduler.record_execution(kind);
            self.dispatch(kind, args).await;

            if wait_or_shutdown(&mut shutdown, self.pace).await {
                break;
            }
        }

        for (action, count) in self.scheduler.counters() {
            tracing::info!(worker = self.id, action, count, "worker action count");
        }
    }

    /// Seed the shared catalog before entering steady state.  Exhausting the
    /// budget is not fatal: the worker starts with an empty catalog and the
    /// catalog-dependent actions stay filtered out until a later fetch lands.
    async fn initial_fetch(&mut self, shutdown: &mut watch::Receiver<bool>) {
        let mut delay = self.policy.initial_delay;
        for attempt in 1..=INITIAL_FETCH_ATTEMPTS {
            match self.fetch_catalog_once().await {
                Ok(products) => {
                    tracing::info!(
                        worker = self.id,
                        count = products.len(),
                        "initial catalog fetch succeeded"
                    );
                    self.catalog.replace_products(products);
                    return;
                }
                Err(reason) => {
                    tracing::warn!(
                        worker = self.id,
                        attempt,
                        max = INITIAL_FETCH_ATTEMPTS,
                        %reason,
                        "initial catalog fetch failed"
                    );
                }
            }
            if attempt < INITIAL_FETCH_ATTEMPTS {
                if wait_or_shutdown(shutdown, delay).await {
                    return;
                }
                delay = (delay * 2).min(self.policy.max_delay);
            }
        }
        tracing::warn!(
            worker = self.id,
            "initial fetch exhausted retries, starting with an empty catalog"
        );
    }

    async fn fetch_catalog_once(&self) -> Result<Vec<crate::Product>, String> {
        let response = self
            .service
            .list_products()
            .await
            .map_err(|err| format!("transport error: {err}"))?;
        let exchange = Exchange::read(response)
            .await
            .map_err(|err| format!("body read error: {err}"))?;
        if exchange.status != 200 {
            return Err(format!("status {}", exchange.status));
        }
        let body = exchange.json().ok_or_else(|| "body is not JSON".to_string())?;
        wire::decode_products(&body).ok_or_else(|| "unrecognized payload shape".to_string())
    }

    async fn dispatch(&mut self, kind: ActionKind, args: ActionArgs) {
        let checks = actions::checks_for(kind);
        let name = kind.name();
        let service = &self.service;
        let started = Instant::now();

        tracing::debug!(worker = self.id, action = name, ?args, "executing action");
        let exchange = match (kind, &args) {
            (ActionKind::FetchCatalog, ActionArgs::None) => {
                execute_with_retry(name, &self.policy, &checks, || service.list_products()).await
            }
            (ActionKind::BrowseCategory, ActionArgs::Category(category)) => {
                execute_with_retry(name, &self.policy, &checks, || {
                    service.list_by_category(category)
                })
                .await
            }
            (ActionKind::ProductDetails, ActionArgs::Name(product)) => {
                execute_with_retry(name, &self.policy, &checks, || {
                    service.product_details(product)
                })
                .await
            }
            (ActionKind::BuyProduct, ActionArgs::Buy { name: product, quantity }) => {
                execute_with_retry(name, &self.policy, &checks, || {
                    service.buy_product(product, *quantity)
                })
                .await
            }
            (ActionKind::UpdateStock, ActionArgs::Stock { name: product, stock }) => {
                execute_with_retry(name, &self.policy, &checks, || {
                    service.update_stock(product, *stock)
                })
                .await
            }
            (ActionKind::InvalidPath, ActionArgs::None) => {
                execute_with_retry(name, &self.policy, &checks, || service.invalid_path()).await
            }
            (ActionKind::HealthCheck, ActionArgs::None) => {
                execute_with_retry(name, &self.policy, &checks, || service.health_check()).await
            }
            (kind, args) => {
                tracing::error!(worker = self.id, ?kind, ?args, "argument shape mismatch");
                return;
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        match exchange {
            Some(exchange) => {
                self.stats.record_exchange(name, exchange.status, latency_ms);
                if kind == ActionKind::FetchCatalog && exchange.status == 200 {
                    self.refresh_catalog(&exchange);
                }
            }
            None => {
                self.stats.record_no_response(name);
            }
        }
    }

    /// Always replace on a successful fetch, even when the name set is
    /// unchanged: price and stock staleness matters as much as membership.
    fn refresh_catalog(&self, exchange: &Exchange) {
        let Some(body) = exchange.json() else {
            tracing::warn!(worker = self.id, "catalog response body is not JSON");
            return;
        };
        match wire::decode_products(&body) {
            Some(products) => {
                tracing::debug!(
                    worker = self.id,
                    old = self.catalog.len(),
                    new = products.len(),
                    "refreshing shared catalog"
                );
                self.catalog.replace_products(products);
            }
            None => {
                tracing::warn!(worker = self.id, "catalog response had an unusable shape");
            }
        }
    }
}

/// Sleep for `duration` unless shutdown arrives first.  Returns true when
/// the worker should stop.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    tokio::select! {
        _ = sleep(duration) => *shutdown.borrow(),
        _ = shutdown.changed() => true,
    }
}
