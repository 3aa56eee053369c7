use super::RowLayout;
use super::packing::PackedLevel;
use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Composition {
    pub(super) needed_height: f32,
    pub(super) fits: bool,
}

/// Stacks the packed levels top to bottom inside `available_height`.
///
/// When everything fits, the slack widens the gaps between rows (each capped
/// at `max_level_gap`) and whatever is left centers the drawing. Otherwise
/// rows are packed tightly from the top margin.
pub(super) fn compose(
    levels: &mut [PackedLevel],
    available_height: f32,
    single_box_height: f32,
    config: &LayoutConfig,
) -> (Vec<RowLayout>, Composition) {
    let mut rows: Vec<RowLayout> = levels
        .iter()
        .map(|level| {
            let lane_heights: Vec<f32> = level
                .lanes
                .iter()
                .map(|lane| lane.iter().map(|b| b.h).fold(0.0f32, f32::max))
                .collect();
            let lane_gap = if lane_heights.len() > 1 {
                single_box_height * config.lane_gap_ratio
            } else {
                0.0
            };
            let height = lane_heights.iter().sum::<f32>()
                + lane_gap * lane_heights.len().saturating_sub(1) as f32;
            RowLayout {
                depth: level.depth,
                lanes: level
                    .lanes
                    .iter()
                    .map(|lane| lane.iter().map(|b| b.id.clone()).collect())
                    .collect(),
                lane_heights,
                lane_gap,
                height,
                y: 0.0,
            }
        })
        .collect();

    let gaps = rows.len().saturating_sub(1) as f32;
    let content = config.margin_top
        + rows.iter().map(|row| row.height).sum::<f32>()
        + gaps * config.level_gap
        + config.margin_bottom;
    let needed_height = content.max(config.min_needed_height);
    let fits = content <= available_height;

    let (top, level_gap) = if fits {
        let slack = available_height - content;
        let extra = if gaps > 0.0 {
            (slack / gaps).min((config.max_level_gap - config.level_gap).max(0.0))
        } else {
            0.0
        };
        let leftover = slack - extra * gaps;
        (config.margin_top + leftover / 2.0, config.level_gap + extra)
    } else {
        (config.margin_top, config.level_gap)
    };

    let mut cursor = top;
    for (row, level) in rows.iter_mut().zip(levels.iter_mut()) {
        row.y = cursor;
        let mut lane_y = cursor;
        for (lane, lane_height) in level.lanes.iter_mut().zip(&row.lane_heights) {
            for b in lane.iter_mut() {
                b.set_origin(b.x, lane_y);
            }
            lane_y += lane_height + row.lane_gap;
        }
        cursor += row.height + level_gap;
    }

    (rows, Composition { needed_height, fits })
}
