//! Reading and printing YAML/JSON documents

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CliError, CliResult};

/// Document format, chosen by file extension or `--output`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> CliResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            _ => Err(CliError::Format(path.to_path_buf())),
        }
    }
}

/// Parse a YAML or JSON file
pub fn load<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let format = Format::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = match format {
        Format::Yaml => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(&text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| CliError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

pub fn render<T: Serialize>(value: &T, format: Format) -> CliResult<String> {
    match format {
        Format::Yaml => serde_yaml::to_string(value).map_err(|e| CliError::Render(e.to_string())),
        Format::Json => {
            serde_json::to_string_pretty(value).map_err(|e| CliError::Render(e.to_string()))
        }
    }
}
