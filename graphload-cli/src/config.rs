//! CLI config file.
//!
//! The file is a [`LoadConfig`] document plus an `[input]` section that
//! declares the schema of the JSON-lines input:
//!
//! ```toml
//! batch_size = 500
//!
//! [[input.fields]]
//! name = "src"
//! type = "int64"
//!
//! [[input.fields]]
//! name = "dst"
//! type = "int64"
//!
//! [[edges]]
//! name = "follow"
//! source = { field = "src" }
//! target = { field = "dst" }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use graphload_core::LoadConfig;
use graphload_tabular::{BatchSchema, FieldInfo};
use serde::Deserialize;

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputSection {
    pub fields: Vec<FieldInfo>,
}

impl InputSection {
    pub fn schema(&self) -> Arc<BatchSchema> {
        Arc::new(BatchSchema::new(self.fields.clone()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct CliFile {
    #[serde(default)]
    input: InputSection,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub path: PathBuf,
    pub load: LoadConfig,
    pub input: InputSection,
}

/// Resolve the `--config` argument.
pub fn require_path(path: Option<&Path>) -> CliResult<&Path> {
    path.ok_or_else(|| CliError::Usage("--config <FILE> is required".to_string()))
}

pub fn load_config(path: &Path) -> CliResult<CliConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::Config(format!("failed to read {}: {e}", path.display())))?;
    parse_config(path, &content)
}

fn parse_config(path: &Path, content: &str) -> CliResult<CliConfig> {
    let load = LoadConfig::from_toml_str(content)?;
    let file: CliFile = toml::from_str(content)?;
    Ok(CliConfig {
        path: path.to_path_buf(),
        load,
        input: file.input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphload_tabular::FieldType;

    #[test]
    fn test_input_section_alongside_load_settings() {
        let content = r#"
batch_size = 10

[[input.fields]]
name = "src"
type = "int64"

[[input.fields]]
name = "name"
type = "string"
nullable = true

[[tags]]
name = "player"
vertex = { field = "src" }
"#;
        let config = parse_config(Path::new("c.toml"), content).unwrap();
        assert_eq!(config.load.batch_size, 10);
        assert_eq!(config.load.tags.len(), 1);
        let schema = config.input.schema();
        assert_eq!(schema.num_fields(), 2);
        assert_eq!(
            schema.field_by_name("src").map(|f| f.field_type),
            Some(FieldType::Int64)
        );
    }

    #[test]
    fn test_invalid_load_settings_are_config_errors() {
        let err = parse_config(Path::new("c.toml"), "batch_size = 0").unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }
}
