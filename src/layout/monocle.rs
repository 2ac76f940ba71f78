//! Monocle: every window covers the full area, only the focused one is
//! visible on top.

use crate::protocol::types::Area;

use super::{LayoutGeometry, LayoutInput};

pub fn calculate(windows: &[u32], area: Area, input: &LayoutInput) -> Vec<(u32, LayoutGeometry)> {
    let top = input
        .focused
        .filter(|id| windows.contains(id))
        .unwrap_or(windows[0]);
    windows
        .iter()
        .map(|&id| {
            (
                id,
                LayoutGeometry {
                    x: area.x,
                    y: area.y,
                    width: area.width,
                    height: area.height,
                    border: input.border_for(id),
                    visible: id == top,
                },
            )
        })
        .collect()
}
