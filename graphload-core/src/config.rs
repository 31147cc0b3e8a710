//! Load configuration.
//!
//! A [`LoadConfig`] is usually read from a TOML file:
//!
//! ```toml
//! batch_size = 256
//! max_inflight = 100
//! strict_categories = ["graph"]
//!
//! [rate_limit]
//! permits_per_sec = 1024.0
//! timeout_ms = 1000
//!
//! [errors]
//! max_errors = 32
//! path = "/tmp/errors"
//!
//! [checkpoint]
//! path = "/tmp/checkpoints"
//! stream = "nightly"
//!
//! [[edges]]
//! name = "follow"
//! category = "graph"
//! fields = ["degree"]
//! source = { field = "src" }
//! target = { field = "dst", policy = "hash" }
//! rank_field = "ts"
//! ```
//!
//! Every section has defaults, so a file only needs the values it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// Highest S2 cell level.
pub const MAX_CELL_LEVEL: u8 = 30;

// ============================================================================
// Enumerations
// ============================================================================

/// Kind of source a partition reads from.
///
/// Categories drive failure strictness and checkpointing; see
/// [`LoadConfig::strict_categories`] and [`CheckpointConfig::categories`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    /// Flat files (CSV, JSON, Parquet, ORC)
    #[default]
    File,
    /// Tables in a warehouse or relational database
    Table,
    /// Another graph database, read page by page
    Graph,
    /// Message streams
    Stream,
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceCategory::File => "file",
            SourceCategory::Table => "table",
            SourceCategory::Graph => "graph",
            SourceCategory::Stream => "stream",
        };
        f.write_str(name)
    }
}

/// How a raw endpoint value becomes the store's entity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPolicy {
    Hash,
    Uuid,
}

impl KeyPolicy {
    /// Name of the store-side function applied to the raw value.
    pub fn function_name(self) -> &'static str {
        match self {
            KeyPolicy::Hash => "hash",
            KeyPolicy::Uuid => "uuid",
        }
    }
}

/// Key type of the target graph space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VidType {
    /// 64-bit integer keys, written bare.
    #[default]
    Int,
    /// Fixed-length string keys, written quoted.
    String,
}

// ============================================================================
// Sections
// ============================================================================

/// Token bucket settings, one bucket per partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Steady-state write attempts per second. 0 denies every attempt.
    pub permits_per_sec: f64,
    /// Longest wait for a permit before the attempt counts as throttled.
    pub timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            permits_per_sec: 1024.0,
            timeout_ms: 1000,
        }
    }
}

impl RateLimitConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

/// Error log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorConfig {
    /// Statements a partition may log before it aborts.
    pub max_errors: usize,
    /// Directory holding one error log per entity type and partition.
    pub path: PathBuf,
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self {
            max_errors: 32,
            path: PathBuf::from("./errors"),
        }
    }
}

/// Checkpoint settings. Absent means checkpointing is off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory of the file checkpoint backend.
    pub path: PathBuf,
    /// Logical stream name; the first half of every checkpoint key.
    pub stream: String,
    /// Source categories whose partitions are checkpointed.
    #[serde(default = "default_checkpoint_categories")]
    pub categories: Vec<SourceCategory>,
}

fn default_checkpoint_categories() -> Vec<SourceCategory> {
    vec![SourceCategory::Graph]
}

/// Geo-located endpoint: the key is built from a coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialConfig {
    pub latitude: String,
    pub longitude: String,
    /// Coarsest cell level emitted (inclusive).
    #[serde(default = "default_min_level")]
    pub min_level: u8,
    /// Finest cell level emitted (inclusive).
    #[serde(default = "default_max_level")]
    pub max_level: u8,
}

fn default_min_level() -> u8 {
    10
}

fn default_max_level() -> u8 {
    19
}

impl SpatialConfig {
    pub fn new(latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
            min_level: default_min_level(),
            max_level: default_max_level(),
        }
    }

    pub fn with_levels(mut self, min_level: u8, max_level: u8) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }
}

/// Where an endpoint key comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Source field holding the key. Unused when `spatial` is set.
    #[serde(default)]
    pub field: String,
    /// Key policy; `None` means the raw integral value is the key.
    #[serde(default)]
    pub policy: Option<KeyPolicy>,
    #[serde(default)]
    pub spatial: Option<SpatialConfig>,
}

impl EndpointConfig {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            field: name.into(),
            ..Default::default()
        }
    }

    pub fn with_policy(mut self, policy: KeyPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn spatial(spatial: SpatialConfig) -> Self {
        Self {
            spatial: Some(spatial),
            ..Default::default()
        }
    }

    fn validate(&self, owner: &str) -> Result<()> {
        match &self.spatial {
            Some(s) => {
                if s.latitude.trim().is_empty() || s.longitude.trim().is_empty() {
                    return Err(LoadError::config(format!(
                        "{owner}: spatial endpoint needs latitude and longitude fields"
                    )));
                }
                if s.min_level > s.max_level || s.max_level > MAX_CELL_LEVEL {
                    return Err(LoadError::config(format!(
                        "{owner}: invalid cell level range [{}, {}]",
                        s.min_level, s.max_level
                    )));
                }
            }
            None if self.field.trim().is_empty() => {
                return Err(LoadError::config(format!("{owner}: endpoint field is empty")));
            }
            None => {}
        }
        Ok(())
    }
}

/// One edge type to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub name: String,
    #[serde(default)]
    pub category: SourceCategory,
    pub source: EndpointConfig,
    pub target: EndpointConfig,
    #[serde(default)]
    pub rank_field: Option<String>,
    /// Source fields read as properties. Blank entries are skipped.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Property names in the store; defaults to `fields`.
    #[serde(default)]
    pub property_names: Vec<String>,
    /// Number of partitions the input is split into.
    #[serde(default = "default_partitions")]
    pub partitions: usize,
}

/// One vertex type (tag) to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    pub name: String,
    #[serde(default)]
    pub category: SourceCategory,
    pub vertex: EndpointConfig,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub property_names: Vec<String>,
    #[serde(default = "default_partitions")]
    pub partitions: usize,
}

fn default_partitions() -> usize {
    1
}

fn validate_properties(owner: &str, fields: &[String], names: &[String]) -> Result<()> {
    if !names.is_empty() && names.len() != fields.len() {
        return Err(LoadError::config(format!(
            "{owner}: {} fields but {} property names",
            fields.len(),
            names.len()
        )));
    }
    Ok(())
}

impl EdgeConfig {
    pub fn new(name: impl Into<String>, source: EndpointConfig, target: EndpointConfig) -> Self {
        Self {
            name: name.into(),
            category: SourceCategory::default(),
            source,
            target,
            rank_field: None,
            fields: Vec::new(),
            property_names: Vec::new(),
            partitions: default_partitions(),
        }
    }

    fn validate(&self) -> Result<()> {
        let owner = format!("edge {}", self.name);
        self.source.validate(&owner)?;
        self.target.validate(&owner)?;
        validate_properties(&owner, &self.fields, &self.property_names)?;
        if self.partitions == 0 {
            return Err(LoadError::config(format!("{owner}: partitions must be > 0")));
        }
        Ok(())
    }
}

impl TagConfig {
    pub fn new(name: impl Into<String>, vertex: EndpointConfig) -> Self {
        Self {
            name: name.into(),
            category: SourceCategory::default(),
            vertex,
            fields: Vec::new(),
            property_names: Vec::new(),
            partitions: default_partitions(),
        }
    }

    fn validate(&self) -> Result<()> {
        let owner = format!("tag {}", self.name);
        self.vertex.validate(&owner)?;
        validate_properties(&owner, &self.fields, &self.property_names)?;
        if self.partitions == 0 {
            return Err(LoadError::config(format!("{owner}: partitions must be > 0")));
        }
        Ok(())
    }
}

// ============================================================================
// LoadConfig
// ============================================================================

/// Top-level configuration for a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Records per write attempt. Default: 256.
    pub batch_size: usize,
    /// In-flight window in records. The submit that brings outstanding
    /// attempts to this many records reconciles the window, so it also bounds
    /// outstanding attempts. Default: 100.
    pub max_inflight: usize,
    pub rate_limit: RateLimitConfig,
    pub errors: ErrorConfig,
    pub checkpoint: Option<CheckpointConfig>,
    /// Categories for which any failed write aborts the partition.
    pub strict_categories: Vec<SourceCategory>,
    pub vid_type: VidType,
    pub edges: Vec<EdgeConfig>,
    pub tags: Vec<TagConfig>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            max_inflight: 100,
            rate_limit: RateLimitConfig::default(),
            errors: ErrorConfig::default(),
            checkpoint: None,
            strict_categories: vec![SourceCategory::Graph],
            vid_type: VidType::default(),
            edges: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl LoadConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: LoadConfig =
            toml::from_str(s).map_err(|e| LoadError::config(format!("parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LoadError::config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LoadError::config("batch_size must be > 0"));
        }
        if self.max_inflight == 0 {
            return Err(LoadError::config("max_inflight must be > 0"));
        }
        if !self.rate_limit.permits_per_sec.is_finite() || self.rate_limit.permits_per_sec < 0.0 {
            return Err(LoadError::config(format!(
                "rate_limit.permits_per_sec must be a non-negative number, got {}",
                self.rate_limit.permits_per_sec
            )));
        }
        if let Some(cp) = &self.checkpoint {
            if cp.stream.trim().is_empty() {
                return Err(LoadError::config("checkpoint.stream is empty"));
            }
        }
        for edge in &self.edges {
            edge.validate()?;
        }
        for tag in &self.tags {
            tag.validate()?;
        }
        Ok(())
    }

    /// Whether a failed write aborts partitions of this category.
    pub fn is_strict(&self, category: SourceCategory) -> bool {
        self.strict_categories.contains(&category)
    }

    /// Whether partitions of this category persist checkpoints.
    pub fn checkpoints(&self, category: SourceCategory) -> bool {
        self.checkpoint
            .as_ref()
            .is_some_and(|cp| cp.categories.contains(&category))
    }

    /// Log all effective settings once per run.
    pub fn log_effective_settings(&self) {
        tracing::info!(
            batch_size = self.batch_size,
            max_inflight = self.max_inflight,
            permits_per_sec = self.rate_limit.permits_per_sec,
            timeout_ms = self.rate_limit.timeout_ms,
            max_errors = self.errors.max_errors,
            error_path = %self.errors.path.display(),
            checkpoint = self.checkpoint.is_some(),
            edges = self.edges.len(),
            tags = self.tags.len(),
            "load settings"
        );
    }
}
