//! Configuration system for Sleuth.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from the user config directory (`config.toml`) and/or
//! `.sleuth/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SleuthConfig {
    #[serde(default)]
    pub explainer: ExplainerConfig,
    #[serde(default)]
    pub learner: LearnerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control-loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Upper bound on learn/generate/test rounds.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// How many features the relevance learner keeps.
    #[serde(default = "default_top_n_relevant_features")]
    pub top_n_relevant_features: usize,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            top_n_relevant_features: default_top_n_relevant_features(),
        }
    }
}

/// Learner thresholds and model limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerConfig {
    #[serde(default = "default_min_recall")]
    pub min_recall: f64,
    #[serde(default = "default_min_specificity")]
    pub min_specificity: f64,
    #[serde(default = "default_max_conjunction_size")]
    pub max_conjunction_size: usize,
    /// Depth limit for decision trees; unlimited when absent.
    #[serde(default)]
    pub max_tree_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    /// Cap on distinct constants instantiated per nonterminal.
    #[serde(default = "default_max_atomic_values")]
    pub max_atomic_values: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            min_recall: default_min_recall(),
            min_specificity: default_min_specificity(),
            max_conjunction_size: default_max_conjunction_size(),
            max_tree_depth: None,
            min_samples_split: default_min_samples_split(),
            max_atomic_values: default_max_atomic_values(),
        }
    }
}

/// Input generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Inputs requested per hypothesis.
    #[serde(default = "default_num_inputs")]
    pub num_inputs: usize,
    /// Wall-clock budget per hypothesis, in milliseconds.
    #[serde(default = "default_time_out_ms")]
    pub time_out_ms: u64,
    /// Rejection-sampling attempts per generated input.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Fuzzer depth before switching to cheapest expansions.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    /// 1 runs generation inline; more spawns that many workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl GeneratorConfig {
    pub fn time_out(&self) -> Duration {
        Duration::from_millis(self.time_out_ms)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_inputs: default_num_inputs(),
            time_out_ms: default_time_out_ms(),
            max_attempts: default_max_attempts(),
            max_depth: default_max_depth(),
            seed: None,
            workers: default_workers(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write JSON logs to `log_dir`.
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_dir: None,
        }
    }
}

fn default_max_iterations() -> usize {
    10
}

fn default_top_n_relevant_features() -> usize {
    3
}

fn default_min_recall() -> f64 {
    0.9
}

fn default_min_specificity() -> f64 {
    0.6
}

fn default_max_conjunction_size() -> usize {
    2
}

fn default_min_samples_split() -> usize {
    2
}

fn default_max_atomic_values() -> usize {
    16
}

fn default_num_inputs() -> usize {
    5
}

fn default_time_out_ms() -> u64 {
    1000
}

fn default_max_attempts() -> usize {
    1000
}

fn default_max_depth() -> usize {
    10
}

fn default_workers() -> usize {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SleuthConfig {
    /// Reject settings the learners and generators cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        for (name, value) in [
            ("learner.min_recall", self.learner.min_recall),
            ("learner.min_specificity", self.learner.min_specificity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{name} ({value}) must lie in [0, 1]"));
            }
        }
        if self.learner.max_conjunction_size < 2 {
            problems.push(format!(
                "learner.max_conjunction_size ({}) must be at least 2",
                self.learner.max_conjunction_size
            ));
        }
        if self.learner.min_samples_split < 2 {
            problems.push("learner.min_samples_split must be at least 2".to_string());
        }
        if self.generator.num_inputs == 0 {
            problems.push("generator.num_inputs must be positive".to_string());
        }
        if self.generator.workers == 0 {
            problems.push("generator.workers must be positive".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                message: problems.join("; "),
            })
        }
    }
}

/// Load configuration from all sources, merging in priority order.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SLEUTH_`)
/// 3. Workspace-local config (`.sleuth/config.toml`)
/// 4. User config (`<config dir>/sleuth/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SleuthConfig>,
) -> Result<SleuthConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(SleuthConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "sleuth", "sleuth") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".sleuth").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // SLEUTH_LEARNER__MIN_RECALL, SLEUTH_GENERATOR__WORKERS, ...
    figment = figment.merge(Env::prefixed("SLEUTH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SleuthConfig::default();
        assert_eq!(config.explainer.max_iterations, 10);
        assert_eq!(config.explainer.top_n_relevant_features, 3);
        assert_eq!(config.learner.min_recall, 0.9);
        assert_eq!(config.learner.min_specificity, 0.6);
        assert_eq!(config.learner.max_conjunction_size, 2);
        assert_eq!(config.generator.num_inputs, 5);
        assert_eq!(config.generator.time_out(), Duration::from_secs(1));
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = SleuthConfig::default();
        config.generator.seed = Some(42);
        let toml_str = toml::to_string(&config).unwrap();
        let back: SleuthConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SleuthConfig = toml::from_str("[learner]\nmin_recall = 0.8\n").unwrap();
        assert_eq!(config.learner.min_recall, 0.8);
        assert_eq!(config.learner.min_specificity, 0.6);
        assert_eq!(config.generator.workers, 1);
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.learner.max_conjunction_size, 2);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = SleuthConfig::default();
        overrides.explainer.max_iterations = 3;
        overrides.generator.workers = 4;

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.explainer.max_iterations, 3);
        assert_eq!(config.generator.workers, 4);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let sleuth_dir = dir.path().join(".sleuth");
        std::fs::create_dir_all(&sleuth_dir).unwrap();
        std::fs::write(
            sleuth_dir.join("config.toml"),
            r#"
[explainer]
max_iterations = 4

[learner]
min_specificity = 0.75

[generator]
num_inputs = 12
seed = 7
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.explainer.max_iterations, 4);
        assert_eq!(config.learner.min_specificity, 0.75);
        assert_eq!(config.generator.num_inputs, 12);
        assert_eq!(config.generator.seed, Some(7));
        assert_eq!(config.learner.min_recall, 0.9);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SleuthConfig::default();
        config.learner.min_recall = 1.5;
        config.learner.max_conjunction_size = 1;
        config.generator.num_inputs = 0;
        let err = config.validate().unwrap_err();
        let ConfigError::Invalid { message } = err else {
            panic!("unexpected error variant");
        };
        assert!(message.contains("min_recall"));
        assert!(message.contains("max_conjunction_size"));
        assert!(message.contains("num_inputs"));
    }
}
