//! Decoration Module
//!
//! The shared-memory tab bar rendered for workspaces in the tabbed
//! layout. The bar is a decoration surface attached above the focused
//! window, backed by one ARGB8888 buffer of (area width x tab height).
//! Pixel painting goes through the `Painter` seam so a graphics library
//! can replace the built-in flat renderer.

use anyhow::Result;

use crate::connection::Connection;
use crate::protocol::interfaces::{self, river_decoration, river_window, wl_compositor, wl_surface};
use crate::protocol::wire::Arg;
use crate::shm::ShmPool;

/// One tab, in window order.
pub struct Tab<'a> {
    pub title: &'a str,
    pub focused: bool,
    pub urgent: bool,
}

/// Fills an ARGB8888 pixel buffer for a tab bar. The contract mirrors
/// what an external renderer would receive: base address (as a slice),
/// stride, and dimensions.
pub trait Painter {
    fn paint_tab_bar(&self, data: &mut [u8], width: i32, height: i32, stride: i32, tabs: &[Tab]);
}

/// Built-in renderer: a flat background with a solid block over the
/// focused tab's segment.
pub struct FlatPainter {
    pub background: u32,
    pub focused: u32,
    pub urgent: u32,
}

impl FlatPainter {
    fn put(data: &mut [u8], offset: usize, rgb: u32) {
        // ARGB8888 is a little-endian u32: B, G, R, A in memory.
        data[offset] = (rgb & 0xff) as u8;
        data[offset + 1] = ((rgb >> 8) & 0xff) as u8;
        data[offset + 2] = ((rgb >> 16) & 0xff) as u8;
        data[offset + 3] = 0xff;
    }
}

impl Painter for FlatPainter {
    fn paint_tab_bar(&self, data: &mut [u8], width: i32, height: i32, stride: i32, tabs: &[Tab]) {
        if tabs.is_empty() || width <= 0 {
            return;
        }
        let tab_width = width / tabs.len() as i32;
        for y in 0..height {
            let row = (y * stride) as usize;
            for x in 0..width {
                let tab = ((x / tab_width.max(1)) as usize).min(tabs.len() - 1);
                let color = if tabs[tab].urgent {
                    self.urgent
                } else if tabs[tab].focused {
                    self.focused
                } else {
                    self.background
                };
                Self::put(data, row + (x * 4) as usize, color);
            }
        }
    }
}

/// A live tab bar: surface, decoration object, pool and buffer. One per
/// workspace currently showing the tabbed layout.
pub struct TabBar {
    /// Window the decoration surface rides above.
    pub window: u32,
    surface_id: u32,
    decoration_id: u32,
    pool: ShmPool,
    buffer_id: u32,
    width: i32,
    height: i32,
    /// Redraws are coalesced; at most one pending per workspace.
    pub dirty: bool,
}

impl TabBar {
    pub fn create(
        conn: &mut Connection,
        compositor_id: u32,
        shm_id: u32,
        window: u32,
        width: i32,
        height: i32,
    ) -> Result<Self> {
        let surface_id = conn.new_object(&interfaces::WL_SURFACE);
        conn.send_request(
            compositor_id,
            wl_compositor::REQ_CREATE_SURFACE,
            vec![Arg::NewId(surface_id)],
        )?;

        let decoration_id = conn.new_object(&interfaces::RIVER_DECORATION);
        conn.send_request(
            window,
            river_window::REQ_GET_DECORATION_ABOVE,
            vec![Arg::NewId(decoration_id), Arg::Object(surface_id)],
        )?;

        let stride = width * 4;
        let mut pool = ShmPool::new(conn, shm_id, (stride * height) as usize)?;
        let buffer_id = pool.create_buffer(conn, 0, width, height, stride)?;

        Ok(Self {
            window,
            surface_id,
            decoration_id,
            pool,
            buffer_id,
            width,
            height,
            dirty: true,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    /// Grow or shrink the bar to a new width, recreating the buffer.
    pub fn resize(&mut self, conn: &mut Connection, width: i32) -> Result<()> {
        if width == self.width {
            return Ok(());
        }
        conn.send_destructor(self.buffer_id, interfaces::wl_buffer::REQ_DESTROY)?;
        let stride = width * 4;
        self.pool.grow(conn, (stride * self.height) as usize)?;
        self.buffer_id = self.pool.create_buffer(conn, 0, width, self.height, stride)?;
        self.width = width;
        self.dirty = true;
        Ok(())
    }

    /// Paint and commit the bar, synchronized with the next commit of the
    /// window it decorates. The offset places the bar directly above the
    /// window content.
    pub fn render(&mut self, conn: &mut Connection, painter: &dyn Painter, tabs: &[Tab]) -> Result<()> {
        let (width, height) = (self.width, self.height);
        painter.paint_tab_bar(self.pool.data(), width, height, width * 4, tabs);

        conn.send_request(
            self.decoration_id,
            river_decoration::REQ_SET_OFFSET,
            vec![Arg::Int(0), Arg::Int(-self.height)],
        )?;
        conn.send_request(self.decoration_id, river_decoration::REQ_SYNC_NEXT_COMMIT, vec![])?;

        conn.send_request(
            self.surface_id,
            wl_surface::REQ_ATTACH,
            vec![Arg::Object(self.buffer_id), Arg::Int(0), Arg::Int(0)],
        )?;
        conn.send_request(
            self.surface_id,
            wl_surface::REQ_DAMAGE_BUFFER,
            vec![Arg::Int(0), Arg::Int(0), Arg::Int(width), Arg::Int(height)],
        )?;
        conn.send_request(self.surface_id, wl_surface::REQ_COMMIT, vec![])?;
        self.dirty = false;
        Ok(())
    }

    pub fn destroy(&mut self, conn: &mut Connection) -> Result<()> {
        conn.send_destructor(self.buffer_id, interfaces::wl_buffer::REQ_DESTROY)?;
        self.pool.destroy(conn)?;
        conn.send_destructor(self.decoration_id, river_decoration::REQ_DESTROY)?;
        conn.send_destructor(self.surface_id, wl_surface::REQ_DESTROY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_painter_marks_the_focused_segment() {
        let painter = FlatPainter { background: 0x000000, focused: 0xff0000, urgent: 0x00ff00 };
        let (width, height) = (8, 2);
        let mut data = vec![0u8; (width * height * 4) as usize];
        let tabs = [
            Tab { title: "a", focused: false, urgent: false },
            Tab { title: "b", focused: true, urgent: false },
        ];
        painter.paint_tab_bar(&mut data, width, height, width * 4, &tabs);

        // First tab pixel: background (black, opaque).
        assert_eq!(&data[0..4], &[0, 0, 0, 0xff]);
        // Second tab starts at x=4: focused red in BGRA order.
        let offset = (4 * 4) as usize;
        assert_eq!(&data[offset..offset + 4], &[0, 0, 0xff, 0xff]);
    }

    #[test]
    fn urgent_beats_focused() {
        let painter = FlatPainter { background: 0x000000, focused: 0xff0000, urgent: 0x00ff00 };
        let mut data = vec![0u8; 4 * 1 * 4];
        let tabs = [Tab { title: "x", focused: true, urgent: true }];
        painter.paint_tab_bar(&mut data, 4, 1, 16, &tabs);
        assert_eq!(&data[0..4], &[0, 0xff, 0, 0xff]);
    }
}
