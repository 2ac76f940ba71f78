//! Tabbed: a tab bar strip is reserved across the top of the area, every
//! window shares the remaining rectangle and only the focused one shows.

use crate::protocol::types::Area;

use super::{LayoutGeometry, LayoutInput, LayoutParams};

pub fn calculate(
    windows: &[u32],
    area: Area,
    params: &LayoutParams,
    input: &LayoutInput,
) -> Vec<(u32, LayoutGeometry)> {
    let tab_height = params.tab_height.clamp(0, area.height);
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
                    y: area.y + tab_height,
                    width: area.width,
                    height: area.height - tab_height,
                    border: input.border_for(id),
                    visible: id == top,
                },
            )
        })
        .collect()
}

/// The decoration strip the workspace needs rendered for this layout.
pub fn bar_rect(area: Area, params: &LayoutParams) -> Area {
    Area::new(area.x, area.y, area.width, params.tab_height.clamp(0, area.height))
}

#[cfg(test)]
mod tests {
    use super::super::{calculate, test_util, LayoutInput, LayoutKind, LayoutParams};
    use crate::protocol::types::Area;

    #[test]
    fn content_sits_below_the_tab_bar() {
        let (urgent, floating) = test_util::empty_ctx();
        let input = LayoutInput { focused: Some(3), urgent: &urgent, floating: &floating };
        let params = LayoutParams { tab_height: 24, ..Default::default() };
        let area = Area::new(0, 0, 800, 600);
        let out = calculate(LayoutKind::Tabbed, &[1, 2, 3], area, &params, &input);

        for (id, g) in &out {
            assert_eq!((g.x, g.y, g.width, g.height), (0, 24, 800, 576));
            assert_eq!(g.visible, *id == 3);
        }

        let bar = super::bar_rect(area, &params);
        assert_eq!((bar.x, bar.y, bar.width, bar.height), (0, 0, 800, 24));
    }
}
