//! Seat Module
//!
//! Typed handle for a `river_seat_v1` object: pointer-hover tracking, the
//! focus request surface, interactive-operation plumbing, and the key and
//! pointer bindings registered with the compositor.

use std::collections::HashMap;

use tracing::debug;

use crate::connection::Connection;
use crate::error::FatalError;
use crate::protocol::interfaces::{
    self, river_pointer_binding, river_seat, river_xkb_binding, river_xkb_bindings,
};
use crate::protocol::types::Modifiers;
use crate::protocol::wire::Arg;
use crate::wm::bindings::Action;

pub struct Seat {
    pub id: u32,
    /// Window under the pointer; a lookup key, never ownership.
    pub pointer_window: Option<u32>,
    /// Window we last asked the compositor to focus on this seat.
    pub focused_window: Option<u32>,
    pub layer_shell_id: Option<u32>,
    /// (modifiers, keysym) -> binding object, to make re-registration
    /// replace the previous binding.
    key_bindings: HashMap<(u32, u32), u32>,
    pointer_bindings: HashMap<(u32, u32), u32>,
}

impl Seat {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            pointer_window: None,
            focused_window: None,
            layer_shell_id: None,
            key_bindings: HashMap::new(),
            pointer_bindings: HashMap::new(),
        }
    }

    pub fn focus_window(&mut self, conn: &mut Connection, window: u32) -> Result<(), FatalError> {
        self.focused_window = Some(window);
        conn.send_request(self.id, river_seat::REQ_FOCUS_WINDOW, vec![Arg::Object(window)])
    }

    pub fn clear_focus(&mut self, conn: &mut Connection) -> Result<(), FatalError> {
        self.focused_window = None;
        conn.send_request(self.id, river_seat::REQ_CLEAR_FOCUS, vec![])
    }

    pub fn op_start_pointer(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_seat::REQ_OP_START_POINTER, vec![])
    }

    pub fn op_end(&self, conn: &mut Connection) -> Result<(), FatalError> {
        conn.send_request(self.id, river_seat::REQ_OP_END, vec![])
    }

    /// Register a key binding with the xkb-bindings extension and enable
    /// it. An existing binding for the same chord is destroyed first.
    /// Returns the binding object id to associate with an action.
    pub fn bind_key(
        &mut self,
        conn: &mut Connection,
        xkb_bindings_id: u32,
        modifiers: Modifiers,
        sym: u32,
        action: Action,
    ) -> Result<u32, FatalError> {
        let chord = (modifiers.bits(), sym);
        if let Some(old) = self.key_bindings.remove(&chord) {
            conn.send_destructor(old, river_xkb_binding::REQ_DESTROY)?;
        }
        let binding = conn.new_object(&interfaces::RIVER_XKB_BINDING);
        conn.send_request(
            xkb_bindings_id,
            river_xkb_bindings::REQ_GET_XKB_BINDING,
            vec![
                Arg::Object(self.id),
                Arg::NewId(binding),
                Arg::Uint(sym),
                Arg::Uint(modifiers.bits()),
            ],
        )?;
        conn.send_request(binding, river_xkb_binding::REQ_ENABLE, vec![])?;
        self.key_bindings.insert(chord, binding);
        debug!(
            "seat {}: bound {:?}+{:#x} -> {:?} as object {}",
            self.id, modifiers, sym, action, binding
        );
        Ok(binding)
    }

    /// Register a pointer-button binding and enable it.
    pub fn bind_pointer(
        &mut self,
        conn: &mut Connection,
        modifiers: Modifiers,
        button: u32,
    ) -> Result<u32, FatalError> {
        let chord = (modifiers.bits(), button);
        if let Some(old) = self.pointer_bindings.remove(&chord) {
            conn.send_destructor(old, river_pointer_binding::REQ_DESTROY)?;
        }
        let binding = conn.new_object(&interfaces::RIVER_POINTER_BINDING);
        conn.send_request(
            self.id,
            river_seat::REQ_GET_POINTER_BINDING,
            vec![Arg::NewId(binding), Arg::Uint(button), Arg::Uint(modifiers.bits())],
        )?;
        conn.send_request(binding, river_pointer_binding::REQ_ENABLE, vec![])?;
        self.pointer_bindings.insert(chord, binding);
        Ok(binding)
    }

    /// All binding objects registered on this seat.
    pub fn binding_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.key_bindings.values().chain(self.pointer_bindings.values()).copied()
    }
}
