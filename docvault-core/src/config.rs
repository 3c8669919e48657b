use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::StyleConfig;

pub const DEFAULT_MAX_PAGES: usize = 50;

/// Renderer settings: page cap for the overflow policy and the style presets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub max_pages: usize,
    pub styles: StyleConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            styles: StyleConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn trace_loaded(&self) {
        info!(
            max_pages = self.max_pages,
            page_width_mm = self.styles.page.width_mm,
            page_height_mm = self.styles.page.height_mm,
            "Loaded RenderConfig"
        );
        debug!(?self, "RenderConfig loaded (full debug)");
    }
}
