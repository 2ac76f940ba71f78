//! Protocol Bindings
//!
//! Static descriptions of every interface this client speaks: the core
//! Wayland globals plus the River window-management, xkb-bindings and
//! layer-shell extensions. Each request and event is described by its
//! opcode position and an ordered list of argument kinds, which is what
//! the codec needs to decode an incoming frame.

use crate::protocol::wire::ArgKind;
use crate::protocol::wire::ArgKind::{Array, Fd, Fixed, Int, NewId, Object, String, Uint};

/// One request or event in an interface schema.
#[derive(Debug)]
pub struct MessageDesc {
    pub name: &'static str,
    pub args: &'static [ArgKind],
}

/// A named interface with versioned request/event schemas. Opcodes are
/// the indices into `requests` and `events`.
#[derive(Debug)]
pub struct Interface {
    pub name: &'static str,
    pub version: u32,
    pub requests: &'static [MessageDesc],
    pub events: &'static [MessageDesc],
}

impl Interface {
    pub fn event(&self, opcode: u16) -> Option<&'static MessageDesc> {
        self.events.get(opcode as usize)
    }

    pub fn request(&self, opcode: u16) -> Option<&'static MessageDesc> {
        self.requests.get(opcode as usize)
    }
}

const fn msg(name: &'static str, args: &'static [ArgKind]) -> MessageDesc {
    MessageDesc { name, args }
}

pub static WL_DISPLAY: Interface = Interface {
    name: "wl_display",
    version: 1,
    requests: &[msg("sync", &[NewId]), msg("get_registry", &[NewId])],
    events: &[
        msg("error", &[Object, Uint, String]),
        msg("delete_id", &[Uint]),
    ],
};

pub mod wl_display {
    pub const REQ_SYNC: u16 = 0;
    pub const REQ_GET_REGISTRY: u16 = 1;
    pub const EVT_ERROR: u16 = 0;
    pub const EVT_DELETE_ID: u16 = 1;
}

pub static WL_REGISTRY: Interface = Interface {
    name: "wl_registry",
    version: 1,
    // bind carries the interface name and version alongside the new id
    requests: &[msg("bind", &[Uint, String, Uint, NewId])],
    events: &[
        msg("global", &[Uint, String, Uint]),
        msg("global_remove", &[Uint]),
    ],
};

pub mod wl_registry {
    pub const REQ_BIND: u16 = 0;
    pub const EVT_GLOBAL: u16 = 0;
    pub const EVT_GLOBAL_REMOVE: u16 = 1;
}

pub static WL_CALLBACK: Interface = Interface {
    name: "wl_callback",
    version: 1,
    requests: &[],
    events: &[msg("done", &[Uint])],
};

pub static WL_COMPOSITOR: Interface = Interface {
    name: "wl_compositor",
    version: 4,
    requests: &[msg("create_surface", &[NewId]), msg("create_region", &[NewId])],
    events: &[],
};

pub mod wl_compositor {
    pub const REQ_CREATE_SURFACE: u16 = 0;
}

pub static WL_SHM: Interface = Interface {
    name: "wl_shm",
    version: 1,
    requests: &[msg("create_pool", &[NewId, Fd, Int])],
    events: &[msg("format", &[Uint])],
};

pub mod wl_shm {
    pub const REQ_CREATE_POOL: u16 = 0;
    pub const FORMAT_ARGB8888: u32 = 0;
}

pub static WL_SHM_POOL: Interface = Interface {
    name: "wl_shm_pool",
    version: 1,
    requests: &[
        msg("create_buffer", &[NewId, Int, Int, Int, Int, Uint]),
        msg("destroy", &[]),
        msg("resize", &[Int]),
    ],
    events: &[],
};

pub mod wl_shm_pool {
    pub const REQ_CREATE_BUFFER: u16 = 0;
    pub const REQ_DESTROY: u16 = 1;
    pub const REQ_RESIZE: u16 = 2;
}

pub static WL_BUFFER: Interface = Interface {
    name: "wl_buffer",
    version: 1,
    requests: &[msg("destroy", &[])],
    events: &[msg("release", &[])],
};

pub mod wl_buffer {
    pub const REQ_DESTROY: u16 = 0;
}

pub static WL_SURFACE: Interface = Interface {
    name: "wl_surface",
    version: 4,
    requests: &[
        msg("destroy", &[]),
        msg("attach", &[Object, Int, Int]),
        msg("damage", &[Int, Int, Int, Int]),
        msg("frame", &[NewId]),
        msg("set_opaque_region", &[Object]),
        msg("set_input_region", &[Object]),
        msg("commit", &[]),
        msg("set_buffer_transform", &[Int]),
        msg("set_buffer_scale", &[Int]),
        msg("damage_buffer", &[Int, Int, Int, Int]),
    ],
    events: &[msg("enter", &[Object]), msg("leave", &[Object])],
};

pub mod wl_surface {
    pub const REQ_DESTROY: u16 = 0;
    pub const REQ_ATTACH: u16 = 1;
    pub const REQ_COMMIT: u16 = 6;
    pub const REQ_DAMAGE_BUFFER: u16 = 9;
}

pub static WL_OUTPUT: Interface = Interface {
    name: "wl_output",
    version: 4,
    requests: &[msg("release", &[])],
    events: &[
        msg("geometry", &[Int, Int, Int, Int, Int, String, String, Int]),
        msg("mode", &[Uint, Int, Int, Int]),
        msg("done", &[]),
        msg("scale", &[Int]),
        msg("name", &[String]),
        msg("description", &[String]),
    ],
};

pub mod wl_output {
    pub const EVT_SCALE: u16 = 3;
    pub const EVT_NAME: u16 = 4;
}

pub static WL_SEAT: Interface = Interface {
    name: "wl_seat",
    version: 7,
    requests: &[
        msg("get_pointer", &[NewId]),
        msg("get_keyboard", &[NewId]),
        msg("get_touch", &[NewId]),
        msg("release", &[]),
    ],
    events: &[msg("capabilities", &[Uint]), msg("name", &[String])],
};

pub mod wl_seat {
    pub const REQ_GET_POINTER: u16 = 0;
    pub const REQ_GET_KEYBOARD: u16 = 1;
    pub const EVT_CAPABILITIES: u16 = 0;
    pub const CAP_POINTER: u32 = 1;
    pub const CAP_KEYBOARD: u32 = 2;
}

pub static WL_KEYBOARD: Interface = Interface {
    name: "wl_keyboard",
    version: 7,
    requests: &[msg("release", &[])],
    events: &[
        msg("keymap", &[Uint, Fd, Uint]),
        msg("enter", &[Uint, Object, Array]),
        msg("leave", &[Uint, Object]),
        msg("key", &[Uint, Uint, Uint, Uint]),
        msg("modifiers", &[Uint, Uint, Uint, Uint, Uint]),
        msg("repeat_info", &[Int, Int]),
    ],
};

pub mod wl_keyboard {
    pub const EVT_KEYMAP: u16 = 0;
}

pub static WL_POINTER: Interface = Interface {
    name: "wl_pointer",
    version: 7,
    requests: &[msg("set_cursor", &[Uint, Object, Int, Int]), msg("release", &[])],
    events: &[
        msg("enter", &[Uint, Object, Fixed, Fixed]),
        msg("leave", &[Uint, Object]),
        msg("motion", &[Uint, Fixed, Fixed]),
        msg("button", &[Uint, Uint, Uint, Uint]),
        msg("axis", &[Uint, Uint, Fixed]),
        msg("frame", &[]),
        msg("axis_source", &[Uint]),
        msg("axis_stop", &[Uint, Uint]),
        msg("axis_discrete", &[Uint, Int]),
    ],
};

pub static RIVER_WINDOW_MANAGER: Interface = Interface {
    name: "river_window_manager_v1",
    version: 1,
    requests: &[
        msg("stop", &[]),
        msg("destroy", &[]),
        msg("manage_finish", &[]),
        msg("manage_dirty", &[]),
        msg("render_finish", &[]),
        msg("get_shell_surface", &[NewId, Object]),
    ],
    events: &[
        msg("unavailable", &[]),
        msg("finished", &[]),
        msg("manage_start", &[]),
        msg("render_start", &[]),
        msg("session_locked", &[]),
        msg("session_unlocked", &[]),
        msg("window", &[NewId]),
        msg("output", &[NewId]),
        msg("seat", &[NewId]),
    ],
};

pub mod river_window_manager {
    pub const REQ_STOP: u16 = 0;
    pub const REQ_MANAGE_FINISH: u16 = 2;
    pub const REQ_MANAGE_DIRTY: u16 = 3;
    pub const REQ_RENDER_FINISH: u16 = 4;
    pub const EVT_UNAVAILABLE: u16 = 0;
    pub const EVT_FINISHED: u16 = 1;
    pub const EVT_MANAGE_START: u16 = 2;
    pub const EVT_RENDER_START: u16 = 3;
    pub const EVT_SESSION_LOCKED: u16 = 4;
    pub const EVT_SESSION_UNLOCKED: u16 = 5;
    pub const EVT_WINDOW: u16 = 6;
    pub const EVT_OUTPUT: u16 = 7;
    pub const EVT_SEAT: u16 = 8;
}

pub static RIVER_WINDOW: Interface = Interface {
    name: "river_window_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("close", &[]),
        msg("get_node", &[NewId]),
        msg("propose_dimensions", &[Int, Int]),
        msg("hide", &[]),
        msg("show", &[]),
        msg("use_csd", &[]),
        msg("use_ssd", &[]),
        msg("set_borders", &[Uint, Int, Uint, Uint, Uint, Uint]),
        msg("set_tiled", &[Uint]),
        msg("get_decoration_above", &[NewId, Object]),
        msg("get_decoration_below", &[NewId, Object]),
        msg("inform_resize_start", &[]),
        msg("inform_resize_end", &[]),
        msg("set_capabilities", &[Uint]),
        msg("inform_maximized", &[]),
        msg("inform_unmaximized", &[]),
        msg("inform_fullscreen", &[]),
        msg("inform_not_fullscreen", &[]),
        msg("fullscreen", &[Object]),
        msg("exit_fullscreen", &[]),
    ],
    events: &[
        msg("closed", &[]),
        msg("dimensions_hint", &[Int, Int, Int, Int]),
        msg("dimensions", &[Int, Int]),
        msg("app_id", &[String]),
        msg("title", &[String]),
        msg("parent", &[Object]),
        msg("decoration_hint", &[Uint]),
        msg("pointer_move_requested", &[Object]),
        msg("pointer_resize_requested", &[Object, Uint]),
        msg("show_window_menu_requested", &[Object, Int, Int]),
        msg("maximize_requested", &[]),
        msg("unmaximize_requested", &[]),
        msg("fullscreen_requested", &[Object]),
        msg("exit_fullscreen_requested", &[]),
        msg("minimize_requested", &[]),
    ],
};

pub mod river_window {
    pub const REQ_DESTROY: u16 = 0;
    pub const REQ_CLOSE: u16 = 1;
    pub const REQ_GET_NODE: u16 = 2;
    pub const REQ_PROPOSE_DIMENSIONS: u16 = 3;
    pub const REQ_HIDE: u16 = 4;
    pub const REQ_SHOW: u16 = 5;
    pub const REQ_SET_BORDERS: u16 = 8;
    pub const REQ_SET_TILED: u16 = 9;
    pub const REQ_GET_DECORATION_ABOVE: u16 = 10;
    pub const REQ_INFORM_RESIZE_START: u16 = 12;
    pub const REQ_INFORM_RESIZE_END: u16 = 13;
    pub const REQ_SET_CAPABILITIES: u16 = 14;
    pub const REQ_INFORM_MAXIMIZED: u16 = 15;
    pub const REQ_INFORM_UNMAXIMIZED: u16 = 16;
    pub const REQ_INFORM_FULLSCREEN: u16 = 17;
    pub const REQ_INFORM_NOT_FULLSCREEN: u16 = 18;
    pub const REQ_FULLSCREEN: u16 = 19;
    pub const REQ_EXIT_FULLSCREEN: u16 = 20;
    pub const EVT_CLOSED: u16 = 0;
    pub const EVT_DIMENSIONS_HINT: u16 = 1;
    pub const EVT_DIMENSIONS: u16 = 2;
    pub const EVT_APP_ID: u16 = 3;
    pub const EVT_TITLE: u16 = 4;
    pub const EVT_PARENT: u16 = 5;
    pub const EVT_DECORATION_HINT: u16 = 6;
    pub const EVT_POINTER_MOVE_REQUESTED: u16 = 7;
    pub const EVT_POINTER_RESIZE_REQUESTED: u16 = 8;
    pub const EVT_MAXIMIZE_REQUESTED: u16 = 10;
    pub const EVT_UNMAXIMIZE_REQUESTED: u16 = 11;
    pub const EVT_FULLSCREEN_REQUESTED: u16 = 12;
    pub const EVT_EXIT_FULLSCREEN_REQUESTED: u16 = 13;
    pub const EVT_MINIMIZE_REQUESTED: u16 = 14;
}

pub static RIVER_NODE: Interface = Interface {
    name: "river_node_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("set_position", &[Int, Int]),
        msg("place_top", &[]),
        msg("place_bottom", &[]),
        msg("place_above", &[Object]),
        msg("place_below", &[Object]),
    ],
    events: &[],
};

pub mod river_node {
    pub const REQ_DESTROY: u16 = 0;
    pub const REQ_SET_POSITION: u16 = 1;
    pub const REQ_PLACE_TOP: u16 = 2;
    pub const REQ_PLACE_BOTTOM: u16 = 3;
    pub const REQ_PLACE_ABOVE: u16 = 4;
}

pub static RIVER_OUTPUT: Interface = Interface {
    name: "river_output_v1",
    version: 1,
    requests: &[msg("destroy", &[])],
    events: &[
        msg("removed", &[]),
        msg("wl_output", &[Uint]),
        msg("position", &[Int, Int]),
        msg("dimensions", &[Int, Int]),
    ],
};

pub mod river_output {
    pub const REQ_DESTROY: u16 = 0;
    pub const EVT_REMOVED: u16 = 0;
    pub const EVT_WL_OUTPUT: u16 = 1;
    pub const EVT_POSITION: u16 = 2;
    pub const EVT_DIMENSIONS: u16 = 3;
}

pub static RIVER_SEAT: Interface = Interface {
    name: "river_seat_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("focus_window", &[Object]),
        msg("focus_shell_surface", &[Object]),
        msg("clear_focus", &[]),
        msg("op_start_pointer", &[]),
        msg("op_end", &[]),
        msg("get_pointer_binding", &[NewId, Uint, Uint]),
    ],
    events: &[
        msg("removed", &[]),
        msg("wl_seat", &[Uint]),
        msg("pointer_enter", &[Object]),
        msg("pointer_leave", &[]),
        msg("window_interaction", &[Object]),
        msg("shell_surface_interaction", &[Object]),
        msg("op_delta", &[Int, Int]),
        msg("op_release", &[]),
    ],
};

pub mod river_seat {
    pub const REQ_FOCUS_WINDOW: u16 = 1;
    pub const REQ_CLEAR_FOCUS: u16 = 3;
    pub const REQ_OP_START_POINTER: u16 = 4;
    pub const REQ_OP_END: u16 = 5;
    pub const REQ_GET_POINTER_BINDING: u16 = 6;
    pub const EVT_REMOVED: u16 = 0;
    pub const EVT_WL_SEAT: u16 = 1;
    pub const EVT_POINTER_ENTER: u16 = 2;
    pub const EVT_POINTER_LEAVE: u16 = 3;
    pub const EVT_WINDOW_INTERACTION: u16 = 4;
    pub const EVT_OP_DELTA: u16 = 6;
    pub const EVT_OP_RELEASE: u16 = 7;
}

pub static RIVER_POINTER_BINDING: Interface = Interface {
    name: "river_pointer_binding_v1",
    version: 1,
    requests: &[msg("destroy", &[]), msg("enable", &[]), msg("disable", &[])],
    events: &[msg("pressed", &[]), msg("released", &[])],
};

pub mod river_pointer_binding {
    pub const REQ_DESTROY: u16 = 0;
    pub const REQ_ENABLE: u16 = 1;
    pub const EVT_PRESSED: u16 = 0;
}

pub static RIVER_XKB_BINDINGS: Interface = Interface {
    name: "river_xkb_bindings_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("get_xkb_binding", &[Object, NewId, Uint, Uint]),
    ],
    events: &[],
};

pub mod river_xkb_bindings {
    pub const REQ_GET_XKB_BINDING: u16 = 1;
}

pub static RIVER_XKB_BINDING: Interface = Interface {
    name: "river_xkb_binding_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("set_layout_override", &[Uint]),
        msg("enable", &[]),
        msg("disable", &[]),
    ],
    events: &[msg("pressed", &[]), msg("released", &[])],
};

pub mod river_xkb_binding {
    pub const REQ_DESTROY: u16 = 0;
    pub const REQ_ENABLE: u16 = 2;
    pub const EVT_PRESSED: u16 = 0;
}

pub static RIVER_LAYER_SHELL: Interface = Interface {
    name: "river_layer_shell_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("get_output", &[NewId, Object]),
        msg("get_seat", &[NewId, Object]),
    ],
    events: &[],
};

pub mod river_layer_shell {
    pub const REQ_GET_OUTPUT: u16 = 1;
    pub const REQ_GET_SEAT: u16 = 2;
}

pub static RIVER_LAYER_SHELL_OUTPUT: Interface = Interface {
    name: "river_layer_shell_output_v1",
    version: 1,
    requests: &[msg("destroy", &[]), msg("set_default", &[])],
    events: &[msg("non_exclusive_area", &[Int, Int, Int, Int])],
};

pub mod river_layer_shell_output {
    pub const REQ_SET_DEFAULT: u16 = 1;
    pub const EVT_NON_EXCLUSIVE_AREA: u16 = 0;
}

pub static RIVER_LAYER_SHELL_SEAT: Interface = Interface {
    name: "river_layer_shell_seat_v1",
    version: 1,
    requests: &[msg("destroy", &[])],
    events: &[
        msg("focus_exclusive", &[]),
        msg("focus_non_exclusive", &[]),
        msg("focus_none", &[]),
    ],
};

pub static RIVER_DECORATION: Interface = Interface {
    name: "river_decoration_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("set_offset", &[Int, Int]),
        msg("sync_next_commit", &[]),
    ],
    events: &[],
};

pub mod river_decoration {
    pub const REQ_DESTROY: u16 = 0;
    pub const REQ_SET_OFFSET: u16 = 1;
    pub const REQ_SYNC_NEXT_COMMIT: u16 = 2;
}

pub static RIVER_SHELL_SURFACE: Interface = Interface {
    name: "river_shell_surface_v1",
    version: 1,
    requests: &[
        msg("destroy", &[]),
        msg("get_node", &[NewId]),
        msg("sync_next_commit", &[]),
    ],
    events: &[],
};

/// Every interface this client knows how to speak.
pub static ALL: &[&Interface] = &[
    &WL_DISPLAY,
    &WL_REGISTRY,
    &WL_CALLBACK,
    &WL_COMPOSITOR,
    &WL_SHM,
    &WL_SHM_POOL,
    &WL_BUFFER,
    &WL_SURFACE,
    &WL_OUTPUT,
    &WL_SEAT,
    &WL_KEYBOARD,
    &WL_POINTER,
    &RIVER_WINDOW_MANAGER,
    &RIVER_WINDOW,
    &RIVER_NODE,
    &RIVER_OUTPUT,
    &RIVER_SEAT,
    &RIVER_POINTER_BINDING,
    &RIVER_XKB_BINDINGS,
    &RIVER_XKB_BINDING,
    &RIVER_LAYER_SHELL,
    &RIVER_LAYER_SHELL_OUTPUT,
    &RIVER_LAYER_SHELL_SEAT,
    &RIVER_DECORATION,
    &RIVER_SHELL_SURFACE,
];

pub fn by_name(name: &str) -> Option<&'static Interface> {
    ALL.iter().find(|i| i.name == name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_index_into_schemas() {
        assert_eq!(WL_SURFACE.request(wl_surface::REQ_ATTACH).unwrap().name, "attach");
        assert_eq!(
            RIVER_WINDOW_MANAGER.event(river_window_manager::EVT_WINDOW).unwrap().name,
            "window"
        );
        assert_eq!(
            RIVER_WINDOW.request(river_window::REQ_PROPOSE_DIMENSIONS).unwrap().args,
            &[Int, Int][..]
        );
    }

    #[test]
    fn lookup_by_name() {
        assert!(by_name("river_window_manager_v1").is_some());
        assert!(by_name("wl_data_device_manager").is_none());
    }

    #[test]
    fn keymap_event_carries_a_descriptor() {
        let desc = WL_KEYBOARD.event(wl_keyboard::EVT_KEYMAP).unwrap();
        assert!(desc.args.contains(&Fd));
    }
}
