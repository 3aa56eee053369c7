pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod layout;
pub mod layout_dump;
pub mod payload;
pub mod render;
pub mod surface;
pub mod text_metrics;
pub mod theme;
pub mod view;

pub use cache::{DrawRequest, DrawStatus, PerfSnapshot, RenderCache, TreeDrawing};
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, RenderConfig};
pub use error::{Error, Result};
pub use layout::{LayoutResult, compute_layout};
pub use payload::{NormalizedPayload, normalize, parse_payload_str};
pub use render::{HitMap, HitRect, draw_layout};
pub use surface::{RecordingSurface, Surface, SvgSurface};
pub use theme::{ColorResolver, Rgba, Theme, ThemeColors};
pub use view::{ClickKind, ClickOutcome, DependencyTreeView, HostBridge, SelectOutcome};

/// Lays out and draws a payload into an SVG document in one call.
pub fn render_payload_svg(
    payload: &NormalizedPayload,
    width: f32,
    height: f32,
    config: &Config,
) -> (String, LayoutResult) {
    let colors = ThemeColors::new(&config.theme);
    let mut surface = SvgSurface::new(
        width,
        height,
        &config.theme.font_family,
        config.layout.fast_text_metrics,
    );
    let layout = compute_layout(
        payload,
        width,
        height,
        &surface,
        &colors,
        &config.theme,
        &config.layout,
    );
    draw_layout(&layout, &mut surface, config, 0);
    (surface.finish(), layout)
}
