//! Floating: windows keep whatever geometry they were last given; windows
//! without one are centered at two thirds of the area.

use crate::protocol::types::Area;

use super::{LayoutGeometry, LayoutInput};

pub fn calculate(windows: &[u32], area: Area, input: &LayoutInput) -> Vec<(u32, LayoutGeometry)> {
    windows
        .iter()
        .map(|&id| {
            let rect = input.floating.get(&id).copied().unwrap_or_else(|| {
                let width = area.width * 2 / 3;
                let height = area.height * 2 / 3;
                Area::new(
                    area.x + (area.width - width) / 2,
                    area.y + (area.height - height) / 2,
                    width,
                    height,
                )
            });
            (
                id,
                LayoutGeometry {
                    x: rect.x,
                    y: rect.y,
                    width: rect.width.max(1),
                    height: rect.height.max(1),
                    border: input.border_for(id),
                    visible: true,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::super::{calculate, LayoutInput, LayoutKind, LayoutParams};
    use crate::protocol::types::Area;

    #[test]
    fn remembered_geometry_wins() {
        let urgent = HashSet::new();
        let mut floating = HashMap::new();
        floating.insert(5u32, Area::new(40, 50, 320, 200));
        let input = LayoutInput { focused: None, urgent: &urgent, floating: &floating };
        let out = calculate(
            LayoutKind::Floating,
            &[5],
            Area::new(0, 0, 1200, 900),
            &LayoutParams::default(),
            &input,
        );
        assert_eq!(
            (out[0].1.x, out[0].1.y, out[0].1.width, out[0].1.height),
            (40, 50, 320, 200)
        );
    }

    #[test]
    fn new_windows_are_centered_at_two_thirds() {
        let urgent = HashSet::new();
        let floating = HashMap::new();
        let input = LayoutInput { focused: None, urgent: &urgent, floating: &floating };
        let out = calculate(
            LayoutKind::Floating,
            &[1],
            Area::new(0, 0, 900, 600),
            &LayoutParams::default(),
            &input,
        );
        let g = out[0].1;
        assert_eq!((g.width, g.height), (600, 400));
        assert_eq!((g.x, g.y), (150, 100));
    }
}
