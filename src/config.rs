use crate::error::{Error, Result};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    // Box packing
    pub min_box_width: f32,
    pub max_box_width: f32,
    pub box_pad_x: f32,
    pub box_pad_y: f32,
    pub label_line_height: f32,
    pub max_label_lines: usize,
    pub item_gap: f32,
    pub lane_offset_factor: f32,
    pub lane_stagger: f32,
    pub margin_x: f32,
    // Vertical composition
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub level_gap: f32,
    pub max_level_gap: f32,
    pub lane_gap_ratio: f32,
    pub min_needed_height: f32,
    pub min_width: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub grow_ceiling: f32,
    pub grow_threshold: f32,
    pub empty_height: f32,
    // Ordering
    pub order_passes: usize,
    // Routing
    pub fork_stub: f32,
    pub approach: f32,
    pub corridor_margin: f32,
    pub corridor_spacing: f32,
    pub fast_text_metrics: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_box_width: 48.0,
            max_box_width: 220.0,
            box_pad_x: 8.0,
            box_pad_y: 5.0,
            label_line_height: 1.3,
            max_label_lines: 2,
            item_gap: 10.0,
            lane_offset_factor: 0.20,
            lane_stagger: 12.0,
            margin_x: 24.0,
            margin_top: 10.0,
            margin_bottom: 10.0,
            level_gap: 30.0,
            max_level_gap: 64.0,
            lane_gap_ratio: 0.7,
            min_needed_height: 96.0,
            min_width: 120.0,
            min_height: 120.0,
            max_height: 340.0,
            grow_ceiling: 420.0,
            grow_threshold: 24.0,
            empty_height: 32.0,
            order_passes: 6,
            fork_stub: 12.0,
            approach: 8.0,
            corridor_margin: 8.0,
            corridor_spacing: 10.0,
            fast_text_metrics: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub line_width: f32,
    pub corner_radius: f32,
    pub arrow_scale: f32,
    pub dot_radius: f32,
    pub box_radius: f32,
    pub box_fill_alpha: f32,
    pub box_stroke_width: f32,
    pub root_outline_width: f32,
    pub root_outline_gap: f32,
    pub empty_message: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            line_width: 1.4,
            corner_radius: 7.0,
            arrow_scale: 3.5,
            dot_radius: 2.5,
            box_radius: 4.0,
            box_fill_alpha: 0.18,
            box_stroke_width: 1.2,
            root_outline_width: 2.0,
            root_outline_gap: 2.5,
            empty_message: "No dependencies".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    /// Upper bound on cached payloads kept by the view; `None` keeps all.
    pub payload_cache_capacity: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::modern(),
            layout: LayoutConfig::default(),
            render: RenderConfig::default(),
            payload_cache_capacity: Some(256),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<serde_json::Value>,
    layout: Option<serde_json::Value>,
    render: Option<serde_json::Value>,
    payload_cache_capacity: Option<usize>,
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents)
}

/// Applies a JSON config document over the defaults. Unknown keys are ignored.
pub fn parse_config(contents: &str) -> Result<Config> {
    let parsed: ConfigFile = serde_json::from_str(contents)?;
    let mut config = Config::default();

    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "dark" {
            config.theme = Theme::dark();
        } else if theme_name == "modern" || theme_name == "default" {
            config.theme = Theme::modern();
        }
    }
    if let Some(vars) = parsed.theme_variables {
        config.theme = merge_section(&config.theme, vars)?;
    }
    if let Some(layout) = parsed.layout {
        config.layout = merge_section(&config.layout, layout)?;
    }
    if let Some(render) = parsed.render {
        config.render = merge_section(&config.render, render)?;
    }
    if let Some(capacity) = parsed.payload_cache_capacity {
        config.payload_cache_capacity = (capacity > 0).then_some(capacity);
    }
    Ok(config)
}

fn merge_section<T>(base: &T, overrides: serde_json::Value) -> Result<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut value = serde_json::to_value(base)?;
    if let (Some(target), serde_json::Value::Object(source)) = (value.as_object_mut(), overrides)
    {
        for (key, val) in source {
            target.insert(key, val);
        }
    }
    Ok(serde_json::from_value(value)?)
}
