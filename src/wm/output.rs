//! Output Module
//!
//! Typed handle for a `river_output_v1` object with its nine workspaces,
//! the linked `wl_output` state (name, scale), and the layer-shell
//! non-exclusive area that constrains layouts.

use crate::layout::LayoutParams;
use crate::protocol::types::Area;
use crate::wm::workspace::{Workspace, WORKSPACE_COUNT};

pub struct Output {
    pub id: u32,
    /// Registry name of the backing wl_output global.
    pub wl_output_global: Option<u32>,
    pub name: Option<String>,
    pub scale: i32,

    /// Logical rectangle in the compositor coordinate space.
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,

    /// Region not claimed by exclusive layer surfaces.
    pub non_exclusive_area: Option<Area>,
    pub layer_shell_id: Option<u32>,

    pub workspaces: [Workspace; WORKSPACE_COUNT],
    /// Active workspace, 0-based.
    pub active_ws: usize,
}

impl Output {
    pub fn new(id: u32, params: LayoutParams) -> Self {
        Self {
            id,
            wl_output_global: None,
            name: None,
            scale: 1,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
            non_exclusive_area: None,
            layer_shell_id: None,
            workspaces: std::array::from_fn(|_| Workspace::new(params)),
            active_ws: 0,
        }
    }

    pub fn area(&self) -> Area {
        Area::new(self.x, self.y, self.width, self.height)
    }

    /// Area available to layouts: the layer-shell non-exclusive region when
    /// known, shrunk by the configured outer gap.
    pub fn usable_area(&self, outer_gap: i32) -> Area {
        let base = match self.non_exclusive_area {
            Some(area) if !area.is_empty() => area,
            _ => self.area(),
        };
        base.inset(outer_gap)
    }

    pub fn active_workspace(&self) -> &Workspace {
        &self.workspaces[self.active_ws]
    }

    pub fn active_workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspaces[self.active_ws]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_start_with_nine_empty_workspaces_on_the_first() {
        let out = Output::new(10, LayoutParams::default());
        assert_eq!(out.workspaces.len(), 9);
        assert_eq!(out.active_ws, 0);
        assert!(out.workspaces.iter().all(|ws| ws.windows.is_empty()));
    }

    #[test]
    fn usable_area_prefers_the_non_exclusive_region() {
        let mut out = Output::new(10, LayoutParams::default());
        out.width = 1920;
        out.height = 1080;
        assert_eq!(out.usable_area(10), Area::new(10, 10, 1900, 1060));

        // A top panel reserved 30 px.
        out.non_exclusive_area = Some(Area::new(0, 30, 1920, 1050));
        assert_eq!(out.usable_area(10), Area::new(10, 40, 1900, 1030));
    }
}
