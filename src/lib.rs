// Library exports for urlchart

pub mod chart;
pub mod data;
pub mod error;
pub mod graph;
pub mod palette;
pub mod query;
pub mod server;
pub mod theme;
pub mod view;

pub use chart::{build_spec, build_spec_for, ChartKind, ChartSpec};
pub use data::{parse, parse_table, ColumnarTable};
pub use error::{MappingFailure, ParseFailure};
pub use view::{render, QueryParams, ViewModel};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Largest width or height accepted for a rendered image
pub const MAX_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Svg => "image/svg+xml",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            other => Err(anyhow!("Unknown output format '{}' (expected png or svg)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
        }
    }
}

impl RenderOptions {
    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value == 0 || value > MAX_DIMENSION {
                anyhow::bail!(
                    "{} must be between 1 and {} pixels (got {})",
                    name,
                    MAX_DIMENSION,
                    value
                );
            }
        }
        Ok(())
    }
}
