//! Jig definition files

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use jig_handlers::HandlerConfig;
use jig_mux::GroupDefinition;
use serde::{Deserialize, Serialize};

/// A complete jig: its muxes and the handlers that drive them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JigFile {
    /// Muxes of the jig
    pub group: GroupDefinition,
    /// Hardware behind the mux pins; may be empty for a definition-only file
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

impl JigFile {
    /// Read and parse a JSON jig file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid jig file {}", path.display()))
    }

    /// Parse a jig from JSON text
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
