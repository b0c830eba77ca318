// Library exports for plotdeck

pub mod cache;
pub mod chart;
pub mod cluster;
pub mod data;
pub mod error;
pub mod graph;
pub mod invoker;
pub mod ir;
pub mod loader;
pub mod palette;
pub mod panels;
pub mod params;
pub mod parser;
pub mod plots;
pub mod router;
pub mod scale;
pub mod session;
pub mod stats;
pub mod widgets;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
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
    /// Parse the JSON options object; absent fields take their defaults.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        serde_json::from_str(text).context("Failed to parse render options")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_defaults() {
        let options = RenderOptions::from_json("{}").unwrap();
        assert_eq!((options.width, options.height), (800, 600));
        assert_eq!(options.format, OutputFormat::Png);
    }

    #[test]
    fn test_render_options_svg() {
        let options = RenderOptions::from_json(r#"{"width": 640, "type": "svg"}"#).unwrap();
        assert_eq!(options.width, 640);
        assert_eq!(options.height, 600);
        assert_eq!(options.format, OutputFormat::Svg);
    }

    #[test]
    fn test_render_options_rejects_unknown_type() {
        assert!(RenderOptions::from_json(r#"{"type": "gif"}"#).is_err());
    }
}
