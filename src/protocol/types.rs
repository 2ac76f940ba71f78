//! Protocol Value Types
//!
//! Plain data types shared between the wire layer and the window manager:
//! geometry, edge and modifier flags, decoration hints.

use bitflags::bitflags;

/// A rectangle in output-local logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Area {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Area {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Shrink the area by `gap` pixels on every side.
    pub fn inset(&self, gap: i32) -> Self {
        Self {
            x: self.x + gap,
            y: self.y + gap,
            width: (self.width - 2 * gap).max(0),
            height: (self.height - 2 * gap).max(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Client-provided min/max dimension hints.
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionHint {
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
}

bitflags! {
    /// Which edges of a window touch the layout area boundary.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowEdges: u32 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

impl WindowEdges {
    pub const ALL: WindowEdges = WindowEdges::all();
}

bitflags! {
    /// XKB modifier mask as used by the xkb-bindings extension.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 1;
        const CAPS = 2;
        const CTRL = 4;
        const ALT = 8;
        const MOD2 = 16;
        const MOD3 = 32;
        const SUPER = 64;
        const MOD5 = 128;
    }
}

bitflags! {
    /// Window capabilities advertised to the compositor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowCapabilities: u32 {
        const WINDOW_MENU = 1;
        const MAXIMIZE = 2;
        const FULLSCREEN = 4;
        const MINIMIZE = 8;
    }
}

/// Client decoration preference, as reported by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecorationHint {
    OnlySupportsCsd,
    PrefersCsd,
    PrefersSsd,
    #[default]
    NoPreference,
}

impl DecorationHint {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::OnlySupportsCsd,
            1 => Self::PrefersCsd,
            2 => Self::PrefersSsd,
            _ => Self::NoPreference,
        }
    }
}

/// A border configuration sent with `river_window_v1.set_borders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderConfig {
    pub edges: WindowEdges,
    pub width: i32,
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

impl BorderConfig {
    /// Border on all edges with the given width and 0xRRGGBB color.
    pub fn solid(width: i32, rgb: u32) -> Self {
        Self {
            edges: WindowEdges::ALL,
            width,
            r: (rgb >> 16) & 0xff,
            g: (rgb >> 8) & 0xff,
            b: rgb & 0xff,
            a: 0xffff_ffff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_inset_shrinks_all_sides() {
        let area = Area::new(0, 0, 100, 80);
        let inner = area.inset(10);
        assert_eq!(inner, Area::new(10, 10, 80, 60));
    }

    #[test]
    fn area_inset_clamps_to_zero() {
        let area = Area::new(0, 0, 10, 10);
        assert!(area.inset(8).is_empty());
    }

    #[test]
    fn border_solid_splits_channels() {
        let b = BorderConfig::solid(2, 0x5294e2);
        assert_eq!((b.r, b.g, b.b), (0x52, 0x94, 0xe2));
        assert_eq!(b.edges, WindowEdges::ALL);
    }
}
