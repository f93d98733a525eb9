//! The action catalogue: what a virtual user can do, how often, and how the
//! arguments for each invocation are produced.

use std::collections::HashMap;

use rand::Rng;

use crate::catalog::SharedCatalog;
use crate::validate::{content_type_is, product_schema, status_is, Check, PRODUCT_FIELDS};

/// Categories used for browsing before the catalog has revealed any of its
/// own.  The last entry is intentionally bogus so empty category results get
/// exercised too.
pub const SEED_CATEGORIES: &[&str] = &[
    "Electronics",
    "Apparel",
    "Books",
    "Kitchenware",
    "Furniture",
    "NonExistentCategory",
];

/// One kind of simulated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    FetchCatalog,
    BrowseCategory,
    ProductDetails,
    BuyProduct,
    UpdateStock,
    InvalidPath,
    HealthCheck,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::FetchCatalog,
        ActionKind::BrowseCategory,
        ActionKind::ProductDetails,
        ActionKind::BuyProduct,
        ActionKind::UpdateStock,
        ActionKind::InvalidPath,
        ActionKind::HealthCheck,
    ];

    /// Symbolic name used in configuration and reporting.
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::FetchCatalog => "GET_ALL",
            ActionKind::BrowseCategory => "GET_BY_CATEGORY",
            ActionKind::ProductDetails => "GET_BY_NAME",
            ActionKind::BuyProduct => "BUY_PRODUCT",
            ActionKind::UpdateStock => "UPDATE_STOCK",
            ActionKind::InvalidPath => "BAD_PATH",
            ActionKind::HealthCheck => "HEALTH_CHECK",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the argument generator needs a non-empty catalog.  These
    /// actions are filtered out of selection while the catalog is empty.
    pub fn requires_catalog(self) -> bool {
        matches!(
            self,
            ActionKind::ProductDetails | ActionKind::BuyProduct | ActionKind::UpdateStock
        )
    }

    /// Static default weight table, used when no overrides are configured.
    fn default_weight(self) -> f64 {
        match self {
            ActionKind::FetchCatalog => 0.15,
            ActionKind::BrowseCategory => 0.15,
            ActionKind::ProductDetails => 0.15,
            ActionKind::BuyProduct => 0.15,
            ActionKind::UpdateStock => 0.15,
            ActionKind::InvalidPath => 0.10,
            ActionKind::HealthCheck => 0.15,
        }
    }
}

/// Response checks applied to each action's exchange.  Buy accepts 409
/// because out-of-stock is an expected domain outcome, not a failure; the
/// bad-path probe expects its 404.
pub fn checks_for(kind: ActionKind) -> Vec<Check> {
    match kind {
        ActionKind::FetchCatalog => vec![
            status_is([200]),
            content_type_is("application/json"),
            product_schema(PRODUCT_FIELDS),
        ],
        ActionKind::BrowseCategory => {
            vec![status_is([200]), content_type_is("application/json")]
        }
        ActionKind::ProductDetails => {
            vec![status_is([200]), content_type_is("application/json")]
        }
        ActionKind::BuyProduct => vec![status_is([200, 409])],
        ActionKind::UpdateStock => vec![status_is([200])],
        ActionKind::InvalidPath => vec![status_is([404])],
        ActionKind::HealthCheck => vec![status_is([200])],
    }
}

/// Arguments for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionArgs {
    None,
    Category(String),
    Name(String),
    Buy { name: String, quantity: u32 },
    Stock { name: String, stock: i64 },
}

/// Outcome of argument generation: either arguments, or an explicit signal
/// that the action cannot run this iteration.  Abstention is not an error
/// and must not count against the action's execution counter.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgOutcome {
    Args(ActionArgs),
    Abstain,
}

/// Produce arguments for one invocation of `kind`.  Catalog-dependent
/// actions abstain when the catalog turns out to be empty, which can happen
/// even after selection since another worker may have replaced it meanwhile.
pub fn generate_args<R: Rng>(kind: ActionKind, catalog: &SharedCatalog, rng: &mut R) -> ArgOutcome {
    match kind {
        ActionKind::FetchCatalog | ActionKind::InvalidPath | ActionKind::HealthCheck => {
            ArgOutcome::Args(ActionArgs::None)
        }
        ActionKind::BrowseCategory => {
            // Prefer categories actually observed; fall back to the seed list.
            let category = catalog.random_category().unwrap_or_else(|| {
                SEED_CATEGORIES[rng.gen_range(0..SEED_CATEGORIES.len())].to_string()
            });
            ArgOutcome::Args(ActionArgs::Category(category))
        }
        ActionKind::ProductDetails => match catalog.random_product() {
            Some(product) => ArgOutcome::Args(ActionArgs::Name(product.name)),
            None => ArgOutcome::Abstain,
        },
        ActionKind::BuyProduct => match catalog.random_product() {
            // Small quantities so the simulation does not drain stock instantly.
            Some(product) => ArgOutcome::Args(ActionArgs::Buy {
                name: product.name,
                quantity: rng.gen_range(1..=5),
            }),
            None => ArgOutcome::Abstain,
        },
        ActionKind::UpdateStock => match catalog.random_product() {
            Some(product) => ArgOutcome::Args(ActionArgs::Stock {
                name: product.name,
                stock: rng.gen_range(0..=100),
            }),
            None => ArgOutcome::Abstain,
        },
    }
}

/// Static configuration plus the per-worker execution counter for one action.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    pub weight: f64,
    /// Maximum executions per worker session; `None` means unlimited and
    /// `Some(0)` disables the action outright.
    pub cap: Option<u64>,
    pub executed: u64,
}

impl ActionDescriptor {
    pub fn cap_reached(&self) -> bool {
        self.cap.is_some_and(|cap| self.executed >= cap)
    }
}

/// Weight configuration failures.  All of these are fatal at startup; the
/// process refuses to run with undefined weight semantics.
#[derive(Debug, thiserror::Error)]
pub enum WeightError {
    #[error("unknown action '{0}' in configuration")]
    UnknownAction(String),
    #[error("weight for action '{action}' is negative ({weight})")]
    NegativeWeight { action: String, weight: f64 },
    #[error("override weights sum to {0:.4}, which exceeds 1.0")]
    OverridesExceedOne(f64),
}

/// Build the per-worker action table from weight overrides and caps.
///
/// With no overrides every action keeps its static default weight.  With
/// overrides, overridden actions take their configured weight and the
/// remaining probability mass `max(0, 1 - sum(overrides))` is split evenly
/// across the rest.
pub fn build_actions(
    overrides: &HashMap<String, f64>,
    caps: &HashMap<String, u64>,
) -> Result<Vec<ActionDescriptor>, WeightError> {
    for name in overrides.keys().chain(caps.keys()) {
        if ActionKind::from_name(name).is_none() {
            return Err(WeightError::UnknownAction(name.clone()));
        }
    }
    for (action, &weight) in overrides {
        if weight < 0.0 {
            return Err(WeightError::NegativeWeight {
                action: action.clone(),
                weight,
            });
        }
    }
    let override_sum: f64 = overrides.values().sum();
    if override_sum > 1.0 + 1e-9 {
        return Err(WeightError::OverridesExceedOne(override_sum));
    }

    let not_overridden = ActionKind::ALL
        .iter()
        .filter(|kind| !overrides.contains_key(kind.name()))
        .count();
    let share = if not_overridden > 0 {
        (1.0 - override_sum).max(0.0) / not_overridden as f64
    } else {
        0.0
    };

    Ok(ActionKind::ALL
        .into_iter()
        .map(|kind| {
            let weight = match overrides.get(kind.name()) {
                Some(&weight) => weight,
                None if overrides.is_empty() => kind.default_weight(),
                None => share,
            };
            ActionDescriptor {
                kind,
                weight,
                cap: caps.get(kind.name()).copied(),
                executed: 0,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::Product;

    fn sample_product(name: &str) -> Product {
        Product {
            name: name.to_string(),
            category: Some("Books".to_string()),
            price: 9.99,
            stock: 5,
            ..Product::default()
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        let actions = build_actions(&HashMap::new(), &HashMap::new()).unwrap();
        let total: f64 = actions.iter().map(|a| a.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(actions.len(), ActionKind::ALL.len());
    }

    #[test]
    fn overrides_redistribute_remaining_mass_evenly() {
        let overrides = HashMap::from([("BUY_PRODUCT".to_string(), 0.5)]);
        let actions = build_actions(&overrides, &HashMap::new()).unwrap();
        let buy = actions
            .iter()
            .find(|a| a.kind == ActionKind::BuyProduct)
            .unwrap();
        assert_eq!(buy.weight, 0.5);
        let expected_share = 0.5 / 6.0;
        for action in actions.iter().filter(|a| a.kind != ActionKind::BuyProduct) {
            assert!((action.weight - expected_share).abs() < 1e-9);
        }
        let total: f64 = actions.iter().map(|a| a.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overrides_above_one_are_rejected() {
        let overrides = HashMap::from([
            ("BUY_PRODUCT".to_string(), 0.7),
            ("GET_ALL".to_string(), 0.6),
        ]);
        let err = build_actions(&overrides, &HashMap::new()).unwrap_err();
        assert!(matches!(err, WeightError::OverridesExceedOne(_)));
    }

    #[test]
    fn unknown_action_name_is_rejected() {
        let overrides = HashMap::from([("TELEPORT".to_string(), 0.1)]);
        let err = build_actions(&overrides, &HashMap::new()).unwrap_err();
        assert!(matches!(err, WeightError::UnknownAction(_)));

        let caps = HashMap::from([("TELEPORT".to_string(), 3)]);
        let err = build_actions(&HashMap::new(), &caps).unwrap_err();
        assert!(matches!(err, WeightError::UnknownAction(_)));
    }

    #[test]
    fn negative_override_is_rejected() {
        let overrides = HashMap::from([("GET_ALL".to_string(), -0.1)]);
        let err = build_actions(&overrides, &HashMap::new()).unwrap_err();
        assert!(matches!(err, WeightError::NegativeWeight { .. }));
    }

    #[test]
    fn cap_of_zero_disables_an_action() {
        let caps = HashMap::from([("BAD_PATH".to_string(), 0)]);
        let actions = build_actions(&HashMap::new(), &caps).unwrap();
        let bad_path = actions
            .iter()
            .find(|a| a.kind == ActionKind::InvalidPath)
            .unwrap();
        assert!(bad_path.cap_reached());
    }

    #[test]
    fn catalog_dependent_generators_abstain_when_empty() {
        let catalog = crate::catalog::SharedCatalog::new();
        let mut rng = StdRng::seed_from_u64(7);
        for kind in [
            ActionKind::ProductDetails,
            ActionKind::BuyProduct,
            ActionKind::UpdateStock,
        ] {
            assert_eq!(generate_args(kind, &catalog, &mut rng), ArgOutcome::Abstain);
        }
        // Browse falls back to the seed category list instead of abstaining.
        assert!(matches!(
            generate_args(ActionKind::BrowseCategory, &catalog, &mut rng),
            ArgOutcome::Args(ActionArgs::Category(_))
        ));
    }

    #[test]
    fn generators_produce_arguments_from_the_catalog() {
        let catalog = crate::catalog::SharedCatalog::new();
        catalog.replace_products(vec![sample_product("Widget")]);
        let mut rng = StdRng::seed_from_u64(7);

        match generate_args(ActionKind::BuyProduct, &catalog, &mut rng) {
            ArgOutcome::Args(ActionArgs::Buy { name, quantity }) => {
                assert_eq!(name, "Widget");
                assert!((1..=5).contains(&quantity));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        match generate_args(ActionKind::UpdateStock, &catalog, &mut rng) {
            ArgOutcome::Args(ActionArgs::Stock { name, stock }) => {
                assert_eq!(name, "Widget");
                assert!((0..=100).contains(&stock));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        match generate_args(ActionKind::BrowseCategory, &catalog, &mut rng) {
            ArgOutcome::Args(ActionArgs::Category(category)) => {
                assert_eq!(category, "Books");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
