use crate::error::ConfigError;
use scan_tools::MIN_SECTION_SIZE;
use std::{env, str::FromStr};

pub const WORKERS_ENV: &str = "PAR_SCAN_WORKERS";
pub const MIN_SECTION_ENV: &str = "PAR_SCAN_MIN_SECTION";
pub const CARRY_ENV: &str = "PAR_SCAN_CARRY";

/// How section totals are turned into carries between the two phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarryStrategy {
    /// One worker folds the totals left to right while the others wait.
    #[default]
    Sequential,
    /// All workers run a Kogge-Stone scan over the totals, taking
    /// `ceil(log2 workers)` barrier-separated steps.
    LogDepth,
}

impl FromStr for CarryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(CarryStrategy::Sequential),
            "log-depth" | "logdepth" | "log_depth" => Ok(CarryStrategy::LogDepth),
            _ => Err("expected 'sequential' or 'log-depth'".to_string()),
        }
    }
}

/// Settings for a [`crate::Scanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Worker count. `None` uses the available hardware parallelism.
    pub workers: Option<usize>,
    /// Narrowest section allowed on the parallel path. Values below
    /// [`MIN_SECTION_SIZE`] are raised to it.
    pub min_section_size: usize,
    pub carry: CarryStrategy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: None,
            min_section_size: MIN_SECTION_SIZE,
            carry: CarryStrategy::default(),
        }
    }
}

impl ScanConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Values below 2 are raised to 2.
    pub fn with_min_section_size(mut self, min_section_size: usize) -> Self {
        self.min_section_size = min_section_size.max(MIN_SECTION_SIZE);
        self
    }

    pub fn with_carry(mut self, carry: CarryStrategy) -> Self {
        self.carry = carry;
        self
    }

    /// Defaults overridden by `PAR_SCAN_WORKERS`, `PAR_SCAN_MIN_SECTION`
    /// and `PAR_SCAN_CARRY` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`ScanConfig::from_env`], reading values through `lookup`.
    ///
    /// A minimum section size below 2 is rejected here, whereas
    /// [`ScanConfig::with_min_section_size`] raises it to 2.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(WORKERS_ENV) {
            config.workers = Some(parse(WORKERS_ENV, &value)?);
        }
        if let Some(value) = lookup(MIN_SECTION_ENV) {
            let min_section_size: usize = parse(MIN_SECTION_ENV, &value)?;
            if min_section_size < MIN_SECTION_SIZE {
                return Err(ConfigError::InvalidValue {
                    key: MIN_SECTION_ENV.to_string(),
                    value,
                    reason: format!("must be at least {MIN_SECTION_SIZE}"),
                });
            }
            config.min_section_size = min_section_size;
        }
        if let Some(value) = lookup(CARRY_ENV) {
            config.carry = value.parse().map_err(|reason| ConfigError::InvalidValue {
                key: CARRY_ENV.to_string(),
                value: value.clone(),
                reason,
            })?;
        }

        Ok(config)
    }

    /// The worker count this configuration resolves to.
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(available_workers)
    }
}

/// Hardware parallelism, or 1 if it cannot be determined.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ScanConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ScanConfig::default());
        assert!(config.resolved_workers() >= 1);
    }

    #[test]
    fn overrides() {
        let config = ScanConfig::from_lookup(lookup(&[
            (WORKERS_ENV, "3"),
            (MIN_SECTION_ENV, "16"),
            (CARRY_ENV, "Log-Depth"),
        ]))
        .unwrap();
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.resolved_workers(), 3);
        assert_eq!(config.min_section_size, 16);
        assert_eq!(config.carry, CarryStrategy::LogDepth);
    }

    #[test]
    fn rejects_bad_values() {
        let err = ScanConfig::from_lookup(lookup(&[(WORKERS_ENV, "-2")])).unwrap_err();
        assert_eq!(err.key(), WORKERS_ENV);

        let err = ScanConfig::from_lookup(lookup(&[(MIN_SECTION_ENV, "1")])).unwrap_err();
        assert_eq!(err.key(), MIN_SECTION_ENV);

        let err = ScanConfig::from_lookup(lookup(&[(CARRY_ENV, "tree")])).unwrap_err();
        assert_eq!(err.key(), CARRY_ENV);
        let ConfigError::InvalidValue { value, .. } = err;
        assert_eq!(value, "tree");
    }

    #[test]
    fn threshold_of_one_is_rejected_from_overrides_but_raised_by_builder() {
        match ScanConfig::from_lookup(lookup(&[(MIN_SECTION_ENV, "1")])) {
            Err(ConfigError::InvalidValue { key, value, reason }) => {
                assert_eq!(key, MIN_SECTION_ENV);
                assert_eq!(value, "1");
                assert_eq!(reason, "must be at least 2");
            }
            other => panic!("unexpected {other:?}"),
        }

        let config = ScanConfig::default().with_min_section_size(1);
        assert_eq!(config.min_section_size, MIN_SECTION_SIZE);
    }

    #[test]
    fn builder_clamps_threshold() {
        let config = ScanConfig::default().with_min_section_size(0).with_workers(0);
        assert_eq!(config.min_section_size, MIN_SECTION_SIZE);
        assert_eq!(config.resolved_workers(), 0);
    }
}
