use std::collections::HashMap;
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Pacing between iterations of a worker's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingMode {
    /// Fixed short delay between actions.
    Fast,
    /// Configurable gap between actions.
    Slow,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub base_url: String,
    pub workers: usize,
    pub mode: PacingMode,
    pub gap: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    /// Per-action weight overrides by symbolic name; validated against the
    /// action table at startup.
    pub weight_overrides: HashMap<String, f64>,
    /// Per-action execution caps by symbolic name.  A cap of 0 disables the
    /// action.
    pub caps: HashMap<String, u64>,
}

impl SimConfig {
    pub fn from_env() -> Result<Self> {
        let base_url =
            env::var("PRODUCT_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8082".to_string());

        let workers = parse_optional_u64("STORESIM_WORKERS")?.unwrap_or(4) as usize;
        if workers == 0 {
            return Err(anyhow!("STORESIM_WORKERS must be at least 1"));
        }

        let mode = match env::var("STORESIM_MODE") {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "fast" | "" => PacingMode::Fast,
                "slow" => PacingMode::Slow,
                other => return Err(anyhow!("STORESIM_MODE must be fast or slow, got '{other}'")),
            },
            Err(_) => PacingMode::Fast,
        };

        let gap_secs = parse_optional_f64("STORESIM_GAP_SECS")?.unwrap_or(1.0);
        if gap_secs < 0.0 {
            return Err(anyhow!("STORESIM_GAP_SECS cannot be negative"));
        }

        let timeout_secs = parse_optional_u64("STORESIM_TIMEOUT_SECS")?.unwrap_or(10);
        let max_attempts = parse_optional_u64("STORESIM_MAX_ATTEMPTS")?.unwrap_or(3) as u32;
        if max_attempts == 0 {
            return Err(anyhow!("STORESIM_MAX_ATTEMPTS must be at least 1"));
        }

        let weight_overrides = parse_assignments("STORESIM_WEIGHTS", |value| {
            value
                .parse::<f64>()
                .map_err(|_| anyhow!("expected a float"))
        })?;
        let caps = parse_assignments("STORESIM_CAPS", |value| {
            value
                .parse::<u64>()
                .map_err(|_| anyhow!("expected a non-negative integer"))
        })?;

        Ok(Self {
            base_url,
            workers,
            mode,
            gap: Duration::from_secs_f64(gap_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            max_attempts,
            weight_overrides,
            caps,
        })
    }

    /// Delay between two iterations of a worker's loop.
    pub fn pace(&self) -> Duration {
        match self.mode {
            PacingMode::Fast => Duration::from_millis(50),
            PacingMode::Slow => self.gap,
        }
    }
}

fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a non-negative integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_optional_f64(var: &str) -> Result<Option<f64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a number", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Parse a comma-separated list of `ACTION=value` assignments.  Keys are
/// upper-cased; whether they name real actions is checked later when the
/// action table is built.
fn parse_assignments<T>(
    var: &str,
    parse_value: impl Fn(&str) -> Result<T>,
) -> Result<HashMap<String, T>> {
    let raw = match env::var(var) {
        Ok(raw) => raw,
        Err(env::VarError::NotPresent) => return Ok(HashMap::new()),
        Err(err) => return Err(err.into()),
    };
    let mut parsed = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("{var}: invalid entry '{entry}', expected ACTION=value"))?;
        let value = parse_value(value.trim())
            .map_err(|err| anyhow!("{var}: invalid value for '{}': {err}", key.trim()))?;
        parsed.insert(key.trim().to_ascii_uppercase(), value);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: &[&str] = &[
        "PRODUCT_SERVICE_URL",
        "STORESIM_WORKERS",
        "STORESIM_MODE",
        "STORESIM_GAP_SECS",
        "STORESIM_TIMEOUT_SECS",
        "STORESIM_MAX_ATTEMPTS",
        "STORESIM_WEIGHTS",
        "STORESIM_CAPS",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn parses_environment_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let cfg = SimConfig::from_env().unwrap();
        assert_eq!(cfg.base_url, "http://localhost:8082");
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.mode, PacingMode::Fast);
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.max_attempts, 3);
        assert!(cfg.weight_overrides.is_empty());
        assert!(cfg.caps.is_empty());
        assert_eq!(cfg.pace(), Duration::from_millis(50));
    }

    #[test]
    fn parses_full_configuration() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("PRODUCT_SERVICE_URL", "http://svc:9000/");
        std::env::set_var("STORESIM_WORKERS", "8");
        std::env::set_var("STORESIM_MODE", "slow");
        std::env::set_var("STORESIM_GAP_SECS", "0.5");
        std::env::set_var("STORESIM_TIMEOUT_SECS", "3");
        std::env::set_var("STORESIM_MAX_ATTEMPTS", "5");
        std::env::set_var("STORESIM_WEIGHTS", "buy_product=0.4, GET_ALL=0.2");
        std::env::set_var("STORESIM_CAPS", "BAD_PATH=0,HEALTH_CHECK=10");

        let cfg = SimConfig::from_env().unwrap();
        assert_eq!(cfg.base_url, "http://svc:9000/");
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.mode, PacingMode::Slow);
        assert_eq!(cfg.pace(), Duration::from_millis(500));
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.weight_overrides["BUY_PRODUCT"], 0.4);
        assert_eq!(cfg.weight_overrides["GET_ALL"], 0.2);
        assert_eq!(cfg.caps["BAD_PATH"], 0);
        assert_eq!(cfg.caps["HEALTH_CHECK"], 10);

        clear_env();
    }

    #[test]
    fn rejects_invalid_mode_and_weights() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("STORESIM_MODE", "warp");
        assert!(SimConfig::from_env().is_err());
        std::env::remove_var("STORESIM_MODE");

        std::env::set_var("STORESIM_WEIGHTS", "GET_ALL");
        assert!(SimConfig::from_env().is_err());
        std::env::set_var("STORESIM_WEIGHTS", "GET_ALL=abc");
        assert!(SimConfig::from_env().is_err());
        std::env::remove_var("STORESIM_WEIGHTS");

        std::env::set_var("STORESIM_WORKERS", "0");
        assert!(SimConfig::from_env().is_err());

        clear_env();
    }
}
