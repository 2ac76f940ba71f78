//! Layout Engine
//!
//! Pure geometry: every algorithm maps an ordered window list and a usable
//! area to per-window rectangles, with no access to connection or manager
//! state. Rounding always hands leftover pixels to the first recipients so
//! sizes sum exactly to the area dimension.

mod centered;
mod floating;
mod grid;
mod monocle;
mod tabbed;
mod tiling;

use std::collections::{HashMap, HashSet};

use crate::protocol::types::Area;

pub use tabbed::bar_rect;

/// Border appearance tag for a laid-out window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderKind {
    None,
    Normal,
    Focused,
    Urgent,
}

/// Calculated placement for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub border: BorderKind,
    /// Monocle and tabbed mark everything but the focused window hidden.
    pub visible: bool,
}

/// The algorithms a workspace can cycle through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    TileRight,
    TileBottom,
    Monocle,
    Grid,
    CenteredMaster,
    Floating,
    Tabbed,
}

impl LayoutKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayoutKind::TileRight => "tile-right",
            LayoutKind::TileBottom => "tile-bottom",
            LayoutKind::Monocle => "monocle",
            LayoutKind::Grid => "grid",
            LayoutKind::CenteredMaster => "centered-master",
            LayoutKind::Floating => "floating",
            LayoutKind::Tabbed => "tabbed",
        }
    }
}

/// Default cycle order.
pub const LAYOUTS: &[LayoutKind] = &[
    LayoutKind::TileRight,
    LayoutKind::TileBottom,
    LayoutKind::Monocle,
    LayoutKind::Grid,
    LayoutKind::CenteredMaster,
    LayoutKind::Floating,
    LayoutKind::Tabbed,
];

/// Per-workspace layout parameters.
#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    pub master_count: usize,
    pub master_ratio: f64,
    pub inner_gap: i32,
    pub tab_height: i32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self { master_count: 1, master_ratio: 0.5, inner_gap: 0, tab_height: 24 }
    }
}

/// Read-only context the algorithms consult: focus, urgency, and the
/// remembered geometry of floating windows.
pub struct LayoutInput<'a> {
    pub focused: Option<u32>,
    pub urgent: &'a HashSet<u32>,
    pub floating: &'a HashMap<u32, Area>,
}

impl LayoutInput<'_> {
    pub(crate) fn border_for(&self, window: u32) -> BorderKind {
        if self.urgent.contains(&window) {
            BorderKind::Urgent
        } else if self.focused == Some(window) {
            BorderKind::Focused
        } else {
            BorderKind::Normal
        }
    }
}

/// Compute placements for `windows` (the mapped, non-fullscreen sequence)
/// inside `area`. The result preserves the input order, which the commit
/// phase uses for stacking.
pub fn calculate(
    kind: LayoutKind,
    windows: &[u32],
    area: Area,
    params: &LayoutParams,
    input: &LayoutInput,
) -> Vec<(u32, LayoutGeometry)> {
    if windows.is_empty() || area.is_empty() {
        return Vec::new();
    }
    match kind {
        LayoutKind::TileRight => tiling::calculate(windows, area, params, input, false),
        LayoutKind::TileBottom => tiling::calculate(windows, area, params, input, true),
        LayoutKind::Monocle => monocle::calculate(windows, area, input),
        LayoutKind::Grid => grid::calculate(windows, area, params, input),
        LayoutKind::CenteredMaster => centered::calculate(windows, area, params, input),
        LayoutKind::Floating => floating::calculate(windows, area, input),
        LayoutKind::Tabbed => tabbed::calculate(windows, area, params, input),
    }
}

/// Split `total` pixels into `count` segments separated by `gap`, handing
/// the remainder one pixel at a time to the first segments. Returns
/// (offset, size) pairs relative to the start of the span.
pub(crate) fn split_even(total: i32, count: usize, gap: i32) -> Vec<(i32, i32)> {
    debug_assert!(count > 0);
    let n = count as i32;
    let usable = (total - gap * (n - 1)).max(n);
    let base = usable / n;
    let rem = usable % n;
    let mut out = Vec::with_capacity(count);
    let mut offset = 0;
    for i in 0..n {
        let size = base + i32::from(i < rem);
        out.push((offset, size));
        offset += size + gap;
    }
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_even_distributes_remainder_first() {
        // 1000 px, 3 segments, 10 px gaps: 980 usable -> 327, 327, 326
        let parts = split_even(1000, 3, 10);
        assert_eq!(parts, vec![(0, 327), (337, 327), (674, 326)]);
        let sum: i32 = parts.iter().map(|(_, s)| s).sum();
        assert_eq!(sum + 2 * 10, 1000);
    }

    #[test]
    fn split_even_single_segment_takes_all() {
        assert_eq!(split_even(500, 1, 10), vec![(0, 500)]);
    }

    #[test]
    fn empty_window_list_yields_empty_map() {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: None, urgent: &urgent, floating: &floating };
        for kind in LAYOUTS {
            let out = calculate(
                *kind,
                &[],
                Area::new(0, 0, 800, 600),
                &LayoutParams::default(),
                &input,
            );
            assert!(out.is_empty());
        }
    }
}
