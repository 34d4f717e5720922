use crate::services::analysis::temporal::types::PValueMode;
use crate::time::WindowDuration;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_SETUP_CONFIG_PATH: &str = "/etc/impact-engine/config.json";
const DEFAULT_WINDOW_SIZES: &[&str] = &["1h", "6h", "24h"];

pub(crate) fn setup_config_path() -> PathBuf {
    env_optional_string("IMPACT_SETUP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETUP_CONFIG_PATH))
}

/// Values from the JSON setup file. Environment variables win over these.
#[derive(Debug, Clone, Default, Deserialize)]
struct SetupConfigOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    permutation_iterations: Option<u64>,
    #[serde(default)]
    random_seed: Option<u64>,
    #[serde(default)]
    p_value_mode: Option<String>,
    #[serde(default)]
    max_autocorrelation_lag: Option<u64>,
    #[serde(default)]
    significance_alpha: Option<f64>,
    #[serde(default)]
    default_window_sizes: Option<Vec<String>>,
}

fn load_setup_config_overrides(path: &Path) -> Option<SetupConfigOverrides> {
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse setup config; using env defaults"
            );
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enables the Postgres repository when set.
    pub database_url: Option<String>,
    pub permutation_iterations: u64,
    /// Makes permutation and bootstrap tests reproducible.
    pub random_seed: Option<u64>,
    pub p_value_mode: PValueMode,
    pub max_autocorrelation_lag: u64,
    pub significance_alpha: f64,
    pub default_window_sizes: Vec<WindowDuration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            permutation_iterations: 100,
            random_seed: None,
            p_value_mode: PValueMode::Coarse,
            max_autocorrelation_lag: 100,
            significance_alpha: 0.05,
            default_window_sizes: DEFAULT_WINDOW_SIZES
                .iter()
                .filter_map(|label| WindowDuration::parse(label).ok())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let overrides = load_setup_config_overrides(&setup_config_path()).unwrap_or_default();
        Self::resolve(&overrides)
    }

    fn resolve(overrides: &SetupConfigOverrides) -> Result<Self> {
        let defaults = Self::default();

        let database_url = env_optional_string("IMPACT_DATABASE_URL").or_else(|| {
            overrides
                .database_url
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
        });
        let permutation_iterations = env_u64(
            "IMPACT_PERMUTATION_ITERATIONS",
            overrides
                .permutation_iterations
                .unwrap_or(defaults.permutation_iterations),
        );
        if permutation_iterations == 0 {
            anyhow::bail!("IMPACT_PERMUTATION_ITERATIONS must be at least 1");
        }
        let random_seed = env_optional_string("IMPACT_RANDOM_SEED")
            .map(|value| {
                value
                    .parse::<u64>()
                    .with_context(|| format!("IMPACT_RANDOM_SEED is not an integer: {value}"))
            })
            .transpose()?
            .or(overrides.random_seed);
        let p_value_mode = match env_optional_string("IMPACT_P_VALUE_MODE")
            .or_else(|| overrides.p_value_mode.clone())
        {
            Some(raw) => PValueMode::parse(&raw)
                .with_context(|| format!("unsupported p-value mode {raw:?} (coarse|exact)"))?,
            None => defaults.p_value_mode,
        };
        let max_autocorrelation_lag = env_u64(
            "IMPACT_MAX_AUTOCORRELATION_LAG",
            overrides
                .max_autocorrelation_lag
                .unwrap_or(defaults.max_autocorrelation_lag),
        );
        let significance_alpha = env_f64(
            "IMPACT_SIGNIFICANCE_ALPHA",
            overrides
                .significance_alpha
                .unwrap_or(defaults.significance_alpha),
        );
        if !(significance_alpha > 0.0 && significance_alpha < 1.0) {
            anyhow::bail!("IMPACT_SIGNIFICANCE_ALPHA must be in (0, 1), got {significance_alpha}");
        }
        let default_window_sizes = match env_optional_string("IMPACT_DEFAULT_WINDOW_SIZES") {
            Some(raw) => parse_window_sizes(raw.split(','))?,
            None => match overrides.default_window_sizes.as_ref() {
                Some(labels) => parse_window_sizes(labels.iter().map(String::as_str))?,
                None => defaults.default_window_sizes,
            },
        };

        Ok(Self {
            database_url,
            permutation_iterations,
            random_seed,
            p_value_mode,
            max_autocorrelation_lag,
            significance_alpha,
            default_window_sizes,
        })
    }
}

fn parse_window_sizes<'a>(labels: impl Iterator<Item = &'a str>) -> Result<Vec<WindowDuration>> {
    let mut sizes = Vec::new();
    for label in labels.map(str::trim).filter(|label| !label.is_empty()) {
        let size = WindowDuration::parse(label)
            .with_context(|| format!("invalid default window size {label:?}"))?;
        size.ensure_positive("default window size")?;
        sizes.push(size);
    }
    if sizes.is_empty() {
        anyhow::bail!("default window sizes resolved to an empty list");
    }
    Ok(sizes)
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
}
