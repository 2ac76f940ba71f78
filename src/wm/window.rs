//! Window Module
//!
//! Typed handle for a `river_window_v1` object: local state mirrored from
//! compositor events, pending client-initiated requests, and the request
//! marshalling used by the manage and render phases.

use crate::connection::Connection;
use crate::error::FatalError;
use crate::protocol::interfaces::{self, river_window};
use crate::protocol::types::{
    Area, BorderConfig, DecorationHint, DimensionHint, WindowCapabilities, WindowEdges,
};
use crate::protocol::wire::Arg;

/// Requests the client made that are resolved at the next manage sequence.
#[derive(Debug, Default)]
pub struct PendingRequests {
    pub pointer_move: Option<u32>,
    pub pointer_resize: Option<(u32, WindowEdges)>,
    pub maximize: bool,
    pub unmaximize: bool,
    /// `Some(output)` requests fullscreen; output 0 means "any".
    pub fullscreen: Option<u32>,
    pub exit_fullscreen: bool,
    pub minimize: bool,
}

impl PendingRequests {
    pub fn any(&self) -> bool {
        self.pointer_move.is_some()
            || self.pointer_resize.is_some()
            || self.maximize
            || self.unmaximize
            || self.fullscreen.is_some()
            || self.exit_fullscreen
            || self.minimize
    }
}

pub struct Window {
    pub id: u32,
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub parent: Option<u32>,
    pub decoration_hint: DecorationHint,
    pub dimension_hint: DimensionHint,

    /// Dimensions last acknowledged by the compositor.
    pub width: i32,
    pub height: i32,

    /// A window is pending until the compositor reports its first
    /// dimensions; only mapped windows participate in focus and layout.
    pub mapped: bool,
    pub fullscreen: bool,
    pub urgent: bool,
    /// Minimized windows stay in their workspace but are never shown.
    pub minimized: bool,

    pub floating: bool,
    /// Remembered geometry while floating.
    pub floating_rect: Option<Area>,
    /// Geometry from the last render commit, the seed for move gestures.
    pub last_geometry: Option<Area>,

    /// Render node, created lazily on first placement.
    pub node: Option<u32>,

    pub pending: PendingRequests,
}

impl Window {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            title: None,
            app_id: None,
            parent: None,
            decoration_hint: DecorationHint::default(),
            dimension_hint: DimensionHint::default(),
            width: 0,
            height: 0,
            mapped: false,
            fullscreen: false,
            urgent: false,
            minimized: false,
            floating: false,
            floating_rect: None,
            last_geometry: None,
            node: None,
            pending: PendingRequests::default(),
        }
    }

    /// Clamp a proposed size to the client's dimension hints. A zero hint
    /// bound means unconstrained.
    pub fn clamp_to_hint(&self, width: i32, height: i32) -> (i32, i32) {
        let hint = &self.dimension_hint;
        let mut w = width.max(hint.min_width);
        let mut h = height.max(hint.min_height);
        if hint.max_width > 0 {
            w = w.min(hint.max_width);
        }
        if hint.max_height > 0 {
            h = h.min(hint.max_height);
        }
        (w, h)
    }

    /// CSD-only clients, CSD-preferring clients and dialogs (windows with
    /// a parent) are laid out floating from the start.
    pub fn should_auto_float(&self) -> bool {
        matches!(
            self.decoration_hint,
            DecorationHint::OnlySupportsCsd | DecorationHint::PrefersCsd
        ) || self.parent.is_some()
    }

    // --- requests -----------------------------------------------------

    pub fn close(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_CLOSE, vec![])
    }

    /// Get or create the render node for this window.
    pub fn node(&mut self, conn: &mut Connection) -> Result<u32, FatalError> {
        if let Some(node) = self.node {
            return Ok(node);
        }
        let node = conn.new_object(&interfaces::RIVER_NODE);
        conn.send_request(self.id, river_window::REQ_GET_NODE, vec![Arg::NewId(node)])?;
        self.node = Some(node);
        Ok(node)
    }

    pub fn propose_dimensions(
        &self,
        conn: &mut Connection,
        width: i32,
        height: i32,
    ) -> Result<(), FatalError> {
        conn.send_request(
            self.id,
            river_window::REQ_PROPOSE_DIMENSIONS,
            vec![Arg::Int(width.max(1)), Arg::Int(height.max(1))],
        )
    }

    pub fn show(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_SHOW, vec![])
    }

    pub fn hide(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_HIDE, vec![])
    }

    pub fn set_borders(&self, conn: &mut Connection, config: BorderConfig) -> Result<(), FatalError> {
        conn.send_request(
            self.id,
            river_window::REQ_SET_BORDERS,
            vec![
                Arg::Uint(config.edges.bits()),
                Arg::Int(config.width),
                Arg::Uint(config.r),
                Arg::Uint(config.g),
                Arg::Uint(config.b),
                Arg::Uint(config.a),
            ],
        )
    }

    pub fn set_tiled(&self, conn: &mut Connection, edges: WindowEdges) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_SET_TILED, vec![Arg::Uint(edges.bits())])
    }

    pub fn set_capabilities(
        &self,
        conn: &mut Connection,
        caps: WindowCapabilities,
    ) -> Result<(), FatalError> {
        conn.send_request(
            self.id,
            river_window::REQ_SET_CAPABILITIES,
            vec![Arg::Uint(caps.bits())],
        )
    }

    pub fn inform_resize_start(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_INFORM_RESIZE_START, vec![])
    }

    pub fn inform_resize_end(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_INFORM_RESIZE_END, vec![])
    }

    pub fn inform_maximized(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_INFORM_MAXIMIZED, vec![])
    }

    pub fn inform_unmaximized(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_window::REQ_INFORM_UNMAXIMIZED, vec![])
    }

    /// Enter fullscreen on `output` and tell the client about it.
    pub fn enter_fullscreen(&mut self, conn: &mut Connection, output: u32) -> Result<(), FatalError> {
        self.fullscreen = true;
        conn.send_request(self.id, river_window::REQ_FULLSCREEN, vec![Arg::Object(output)])?;
        conn.send_request(self.id, river_window::REQ_INFORM_FULLSCREEN, vec![])
    }

    pub fn leave_fullscreen(&mut self, conn: &mut Connection) -> Result<(), FatalError> {
        self.fullscreen = false;
        conn.send_request(self.id, river_window::REQ_EXIT_FULLSCREEN, vec![])?;
        conn.send_request(self.id, river_window::REQ_INFORM_NOT_FULLSCREEN, vec![])
    }

    /// Destroy the protocol objects backing this window. Called after the
    /// compositor reported the window closed.
    pub fn destroy(&mut self, conn: &mut Connection) -> Result<(), FatalError> {
        use crate::protocol::interfaces::river_node;
        if let Some(node) = self.node.take() {
            conn.send_destructor(node, river_node::REQ_DESTROY)?;
        }
        conn.send_destructor(self.id, river_window::REQ_DESTROY)
    }
}
