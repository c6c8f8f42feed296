//! Configuration loading, validation, and management for Planmind.
//!
//! Loads configuration from `~/.planmind/config.toml` (overridable via the
//! `PLANMIND_CONFIG` environment variable). Validates all settings at load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.planmind/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Memory compression settings
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Context composition settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Compression scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Thresholds and knobs for the memory compressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Cosine similarity at or above which two vectors are duplicates.
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: f32,

    /// Cosine similarity at or above which a vector joins a cluster.
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f32,

    /// Minimum members for a cluster to be merged at all.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Maximum members per cluster.
    #[serde(default = "default_max_cluster_size")]
    pub max_cluster_size: usize,

    /// Clusters at or above this size get an LLM summary; smaller
    /// qualifying clusters fall back to concatenation.
    #[serde(default = "default_summary_min_size")]
    pub summary_min_size: usize,

    /// Vectors younger than this are never compressed.
    #[serde(default = "default_min_age_days")]
    pub min_age_days: u32,

    /// The N most recently created vectors of a plan are always protected,
    /// regardless of age.
    #[serde(default = "default_protected_recent")]
    pub protected_recent: usize,

    /// How many clusters are processed concurrently in one batch.
    #[serde(default = "default_cluster_batch_size")]
    pub cluster_batch_size: usize,

    /// Max tokens for a cluster summary generation.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Temperature for summary generation.
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
}

fn default_duplicate_threshold() -> f32 {
    0.95
}
fn default_cluster_threshold() -> f32 {
    0.85
}
fn default_min_cluster_size() -> usize {
    2
}
fn default_max_cluster_size() -> usize {
    10
}
fn default_summary_min_size() -> usize {
    3
}
fn default_min_age_days() -> u32 {
    7
}
fn default_protected_recent() -> usize {
    10
}
fn default_cluster_batch_size() -> usize {
    3
}
fn default_summary_max_tokens() -> u32 {
    256
}
fn default_summary_temperature() -> f32 {
    0.3
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: default_duplicate_threshold(),
            cluster_threshold: default_cluster_threshold(),
            min_cluster_size: default_min_cluster_size(),
            max_cluster_size: default_max_cluster_size(),
            summary_min_size: default_summary_min_size(),
            min_age_days: default_min_age_days(),
            protected_recent: default_protected_recent(),
            cluster_batch_size: default_cluster_batch_size(),
            summary_max_tokens: default_summary_max_tokens(),
            summary_temperature: default_summary_temperature(),
        }
    }
}

/// Budgets and limits for context composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total token budget when the caller doesn't supply one.
    #[serde(default = "default_total_budget")]
    pub default_budget: usize,

    /// How many recent messages to keep when no token budget applies.
    #[serde(default = "default_message_window")]
    pub message_window: usize,

    /// Over-fetch multiplier for message retrieval (allows for shrinkage
    /// from filtering and summarization).
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    /// Messages above this estimated token count get summarized.
    #[serde(default = "default_long_message_threshold")]
    pub long_message_threshold: usize,

    /// Max tokens for a long-message summary.
    #[serde(default = "default_message_summary_max_tokens")]
    pub message_summary_max_tokens: u32,

    /// Top-K semantic search hits.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum similarity for a search hit to be included.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// How many recent completed jobs the plan block lists.
    #[serde(default = "default_recent_jobs")]
    pub recent_jobs: usize,

    /// Trim floor for the embeddings block.
    #[serde(default = "default_embeddings_floor")]
    pub embeddings_floor: usize,

    /// Trim floor for the plan block.
    #[serde(default = "default_plan_floor")]
    pub plan_floor: usize,

    /// Trim floor for the conversation block (last resort).
    #[serde(default = "default_conversation_floor")]
    pub conversation_floor: usize,
}

fn default_total_budget() -> usize {
    4096
}
fn default_message_window() -> usize {
    20
}
fn default_overfetch_factor() -> usize {
    2
}
fn default_long_message_threshold() -> usize {
    1000
}
fn default_message_summary_max_tokens() -> u32 {
    256
}
fn default_top_k() -> usize {
    5
}
fn default_min_similarity() -> f32 {
    0.7
}
fn default_recent_jobs() -> usize {
    5
}
fn default_embeddings_floor() -> usize {
    80
}
fn default_plan_floor() -> usize {
    60
}
fn default_conversation_floor() -> usize {
    150
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_budget: default_total_budget(),
            message_window: default_message_window(),
            overfetch_factor: default_overfetch_factor(),
            long_message_threshold: default_long_message_threshold(),
            message_summary_max_tokens: default_message_summary_max_tokens(),
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            recent_jobs: default_recent_jobs(),
            embeddings_floor: default_embeddings_floor(),
            plan_floor: default_plan_floor(),
            conversation_floor: default_conversation_floor(),
        }
    }
}

/// Sweep selection thresholds and the ticker interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the background ticker runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Plans above this live vector count get a light sweep job.
    #[serde(default = "default_archive_threshold")]
    pub archive_threshold: usize,

    /// Plans inactive for this many days (with live vectors) get a full
    /// sweep job.
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: u32,

    /// Minutes between sweep ticks.
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u32,
}

fn default_true() -> bool {
    true
}
fn default_archive_threshold() -> usize {
    200
}
fn default_inactivity_days() -> u32 {
    14
}
fn default_sweep_interval_minutes() -> u32 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            archive_threshold: default_archive_threshold(),
            inactivity_days: default_inactivity_days(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.planmind/config.toml),
    /// or from `PLANMIND_CONFIG` if set.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = match std::env::var("PLANMIND_CONFIG") {
            Ok(p) => PathBuf::from(p),
            Err(_) => Self::config_dir().join("config.toml"),
        };
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".planmind")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        if !(0.0..=1.0).contains(&c.duplicate_threshold) || c.duplicate_threshold == 0.0 {
            return Err(ConfigError::ValidationError(
                "compression.duplicate_threshold must be in (0.0, 1.0]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.cluster_threshold) || c.cluster_threshold == 0.0 {
            return Err(ConfigError::ValidationError(
                "compression.cluster_threshold must be in (0.0, 1.0]".into(),
            ));
        }
        if c.min_cluster_size < 2 {
            return Err(ConfigError::ValidationError(
                "compression.min_cluster_size must be at least 2".into(),
            ));
        }
        if c.max_cluster_size < c.min_cluster_size {
            return Err(ConfigError::ValidationError(
                "compression.max_cluster_size must be >= min_cluster_size".into(),
            ));
        }
        if c.cluster_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "compression.cluster_batch_size must be nonzero".into(),
            ));
        }

        let ctx = &self.context;
        if ctx.default_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.default_budget must be nonzero".into(),
            ));
        }
        if ctx.overfetch_factor == 0 {
            return Err(ConfigError::ValidationError(
                "context.overfetch_factor must be nonzero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&ctx.min_similarity) {
            return Err(ConfigError::ValidationError(
                "context.min_similarity must be in [0.0, 1.0]".into(),
            ));
        }

        if self.scheduler.sweep_interval_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.sweep_interval_minutes must be nonzero".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            compression: CompressionConfig::default(),
            context: ContextConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.compression.protected_recent, 10);
        assert_eq!(config.context.default_budget, 4096);
        assert!(config.scheduler.enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = AppConfig::default_toml();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.compression.duplicate_threshold,
            config.compression.duplicate_threshold
        );
        assert_eq!(parsed.scheduler.archive_threshold, config.scheduler.archive_threshold);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/planmind.toml")).unwrap();
        assert_eq!(config.context.top_k, 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[compression]\nduplicate_threshold = 0.9\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert!((config.compression.duplicate_threshold - 0.9).abs() < f32::EPSILON);
        // untouched sections keep defaults
        assert_eq!(config.compression.min_cluster_size, 2);
        assert_eq!(config.context.message_window, 20);
    }

    #[test]
    fn invalid_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[compression]\nduplicate_threshold = 1.5\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate_threshold"));
    }

    #[test]
    fn cluster_size_bounds_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[compression]\nmin_cluster_size = 5\nmax_cluster_size = 3\n",
        )
        .unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_cluster_size"));
    }
}
