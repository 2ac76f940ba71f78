//! Window Manager Core
//!
//! The state machine that reconciles compositor events with user intent:
//! outputs with their nine workspaces, the focus triad, pending window
//! requests, interactive gestures, and the manage/render commit phases
//! driven by the river window-management protocol.

pub mod bindings;
pub mod operations;
pub mod output;
pub mod seat;
pub mod window;
pub mod workspace;

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::connection::{Connection, Event};
use crate::decoration::{FlatPainter, Tab, TabBar};
use crate::error::FatalError;
use crate::ipc::IpcEvent;
use crate::layout::{self, BorderKind, LayoutGeometry, LayoutInput, LayoutKind, LAYOUTS};
use crate::protocol::interfaces::{
    self, river_layer_shell, river_layer_shell_output, river_output, river_pointer_binding,
    river_seat, river_window, river_window_manager, river_xkb_binding, wl_output, wl_seat,
    Interface,
};
use crate::protocol::types::{Area, BorderConfig, DecorationHint, Modifiers, WindowCapabilities, WindowEdges};
use crate::protocol::wire::Arg;
use crate::spawn;

use bindings::Action;
use operations::{OpKind, Operation};
use output::Output;
use seat::Seat;
use window::Window;

/// Where we are in the river two-phase commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Manage,
    Render,
}

/// Remembered wl_output state, keyed by registry name, waiting to be
/// linked to a river output.
#[derive(Debug, Default, Clone)]
struct WlOutputInfo {
    bound_id: Option<u32>,
    name: Option<String>,
    scale: i32,
}

pub struct Wm {
    conn: Connection,
    config: Config,
    modifier: Modifiers,

    wm_id: u32,
    xkb_bindings_id: u32,
    layer_shell_id: Option<u32>,
    compositor_id: u32,
    shm_id: u32,

    windows: HashMap<u32, Window>,
    outputs: HashMap<u32, Output>,
    /// Outputs in creation order; the head is the migration target.
    output_order: Vec<u32>,
    seats: HashMap<u32, Seat>,

    /// window -> (output, workspace index). Exactly one entry per window.
    locations: HashMap<u32, (u32, usize)>,
    /// Windows whose output disappeared, with their workspace index, kept
    /// until a new output shows up.
    orphans: Vec<(u32, usize)>,

    /// wl_output bookkeeping, keyed by registry name.
    wl_outputs: HashMap<u32, WlOutputInfo>,
    /// Bound wl_output object -> registry name.
    wl_output_ids: HashMap<u32, u32>,
    /// Bound wl_seat object -> registry name.
    wl_seat_ids: HashMap<u32, u32>,
    /// Keyboard and pointer objects. Never consulted after creation, but
    /// the ids must stay tracked so their events dispatch cleanly.
    #[allow(dead_code)]
    input_devices: Vec<u32>,

    focused_output: Option<u32>,
    focused_window: Option<u32>,

    phase: Phase,
    session_locked: bool,
    running: bool,
    exit_code: i32,
    /// A manage sequence is wanted once the current batch is done.
    dirty: bool,

    op: Option<Operation>,
    /// Binding object -> (seat, action).
    actions: HashMap<u32, (u32, Action)>,

    tab_bars: HashMap<(u32, usize), TabBar>,
    painter: FlatPainter,

    ipc_events: VecDeque<IpcEvent>,
}

impl Wm {
    /// Bind the globals this manager requires and build the initial state.
    /// `conn` must already have completed the registry roundtrip.
    pub fn new(mut conn: Connection, config: Config) -> Result<Self, FatalError> {
        let compositor_id = conn.bind_required(&interfaces::WL_COMPOSITOR)?;
        let shm_id = conn.bind_required(&interfaces::WL_SHM)?;
        let wm_id = conn.bind_required(&interfaces::RIVER_WINDOW_MANAGER)?;
        let xkb_bindings_id = conn.bind_required(&interfaces::RIVER_XKB_BINDINGS)?;
        let layer_shell_id = conn
            .find_global(interfaces::RIVER_LAYER_SHELL.name)
            .map(|g| conn.bind_global(&g, &interfaces::RIVER_LAYER_SHELL))
            .transpose()?;
        if layer_shell_id.is_none() {
            warn!("river_layer_shell_v1 not advertised, panels will overlap windows");
        }

        let modifier = config
            .modifier()
            .map_err(|e| FatalError::Connect(e.to_string()))?;
        let painter = FlatPainter {
            background: config.appearance.bar_background,
            focused: config.appearance.bar_focused,
            urgent: config.appearance.urgent_border_color,
        };

        let mut wm = Self {
            conn,
            config,
            modifier,
            wm_id,
            xkb_bindings_id,
            layer_shell_id,
            compositor_id,
            shm_id,
            windows: HashMap::new(),
            outputs: HashMap::new(),
            output_order: Vec::new(),
            seats: HashMap::new(),
            locations: HashMap::new(),
            orphans: Vec::new(),
            wl_outputs: HashMap::new(),
            wl_output_ids: HashMap::new(),
            wl_seat_ids: HashMap::new(),
            input_devices: Vec::new(),
            focused_output: None,
            focused_window: None,
            phase: Phase::Idle,
            session_locked: false,
            running: true,
            exit_code: crate::error::EXIT_OK,
            dirty: false,
            op: None,
            actions: HashMap::new(),
            tab_bars: HashMap::new(),
            painter,
            ipc_events: VecDeque::new(),
        };

        // Bind the wl_output and wl_seat globals advertised so far; river
        // objects link to them by registry name.
        for global in wm.conn.globals.clone() {
            match global.interface.as_str() {
                "wl_output" => wm.bind_wl_output(global.name)?,
                "wl_seat" => wm.bind_wl_seat(global.name)?,
                _ => {}
            }
        }
        Ok(wm)
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn drain_ipc_events(&mut self) -> Vec<IpcEvent> {
        self.ipc_events.drain(..).collect()
    }

    /// One main-loop iteration: poll the socket, dispatch the batch, then
    /// request a manage sequence if anything changed. Returns `false` on
    /// clean shutdown.
    pub fn run_once(&mut self, timeout_ms: i32) -> Result<bool, FatalError> {
        if !self.running {
            return Ok(false);
        }
        let mut events = VecDeque::new();
        let alive = match self.conn.run_once(timeout_ms, &mut events) {
            Ok(alive) => alive,
            Err(e) => {
                self.exit_code = e.exit_code();
                self.running = false;
                return Err(e);
            }
        };
        while let Some(event) = events.pop_front() {
            if let Err(e) = self.dispatch(event) {
                self.exit_code = e.exit_code();
                self.running = false;
                return Err(e);
            }
        }
        self.flush_dirty()?;
        if !alive {
            info!("compositor closed the connection");
            self.running = false;
        }
        Ok(self.running)
    }

    /// Send `manage_dirty` for state changed outside a manage sequence and
    /// push out everything buffered, so observable state converges per
    /// event batch.
    pub fn flush_dirty(&mut self) -> Result<(), FatalError> {
        if self.dirty && self.phase == Phase::Idle {
            self.conn
                .send_request(self.wm_id, river_window_manager::REQ_MANAGE_DIRTY, vec![])?;
            self.dirty = false;
        }
        self.conn.flush()
    }

    /// Stop the manager. Idempotent: repeated quits are a no-op.
    pub fn quit(&mut self) {
        if !self.running {
            return;
        }
        info!("quitting");
        let _ = self
            .conn
            .send_request(self.wm_id, river_window_manager::REQ_STOP, vec![]);
        let _ = self.conn.flush();
        self.running = false;
    }

    // --- event dispatch ------------------------------------------------

    fn dispatch(&mut self, event: Event) -> Result<(), FatalError> {
        let iface = event.interface;
        if same(iface, &interfaces::RIVER_WINDOW_MANAGER) {
            self.on_manager_event(event)
        } else if same(iface, &interfaces::RIVER_WINDOW) {
            self.on_window_event(event)
        } else if same(iface, &interfaces::RIVER_OUTPUT) {
            self.on_output_event(event)
        } else if same(iface, &interfaces::RIVER_SEAT) {
            self.on_seat_event(event)
        } else if same(iface, &interfaces::RIVER_XKB_BINDING)
            || same(iface, &interfaces::RIVER_POINTER_BINDING)
        {
            self.on_binding_event(event)
        } else if same(iface, &interfaces::RIVER_LAYER_SHELL_OUTPUT) {
            self.on_layer_shell_output_event(event)
        } else if same(iface, &interfaces::WL_OUTPUT) {
            self.on_wl_output_event(event)
        } else if same(iface, &interfaces::WL_SEAT) {
            self.on_wl_seat_event(event)
        } else if same(iface, &interfaces::WL_KEYBOARD) {
            // The compositor interprets keys through the binding objects;
            // the keymap descriptor is closed when the args drop.
            Ok(())
        } else {
            debug!("unhandled event on {} object {}", iface.name, event.object_id);
            Ok(())
        }
    }

    fn on_manager_event(&mut self, event: Event) -> Result<(), FatalError> {
        match event.opcode {
            river_window_manager::EVT_UNAVAILABLE => {
                error!("{}", FatalError::Unavailable);
                self.exit_code = FatalError::Unavailable.exit_code();
                self.running = false;
            }
            river_window_manager::EVT_FINISHED => {
                info!("compositor finished the management session");
                self.running = false;
            }
            river_window_manager::EVT_MANAGE_START => {
                self.phase = Phase::Manage;
                self.on_manage()?;
            }
            river_window_manager::EVT_RENDER_START => {
                self.phase = Phase::Render;
                self.on_render()?;
            }
            river_window_manager::EVT_SESSION_LOCKED => {
                self.session_locked = true;
            }
            river_window_manager::EVT_SESSION_UNLOCKED => {
                self.session_locked = false;
                self.dirty = true;
            }
            river_window_manager::EVT_WINDOW => {
                let id = event.args[0].as_uint();
                self.conn.register(id, &interfaces::RIVER_WINDOW);
                self.on_window_created(id)?;
            }
            river_window_manager::EVT_OUTPUT => {
                let id = event.args[0].as_uint();
                self.conn.register(id, &interfaces::RIVER_OUTPUT);
                self.on_output_added(id)?;
            }
            river_window_manager::EVT_SEAT => {
                let id = event.args[0].as_uint();
                self.conn.register(id, &interfaces::RIVER_SEAT);
                self.on_seat_added(id)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn on_window_created(&mut self, id: u32) -> Result<(), FatalError> {
        debug!("window {} created", id);
        let window = Window::new(id);
        window.set_capabilities(
            &mut self.conn,
            WindowCapabilities::WINDOW_MENU
                | WindowCapabilities::MAXIMIZE
                | WindowCapabilities::FULLSCREEN
                | WindowCapabilities::MINIMIZE,
        )?;
        self.windows.insert(id, window);

        // Assign to the focused workspace of the focused output, at the
        // tail of its sequence; unmapped until the first dimensions ack.
        let target = self.focused_output.or_else(|| self.output_order.first().copied());
        match target {
            Some(out_id) => {
                let output = self.outputs.get_mut(&out_id).expect("focused output exists");
                let ws_idx = output.active_ws;
                let ws = &mut output.workspaces[ws_idx];
                ws.add_window(id);
                // The workspace focus slot only ever names mapped windows;
                // this one takes focus when its first dimensions arrive.
                if ws.focused == Some(id) {
                    ws.focused = None;
                }
                self.locations.insert(id, (out_id, ws_idx));
            }
            None => self.orphans.push((id, 0)),
        }
        Ok(())
    }

    fn on_output_added(&mut self, id: u32) -> Result<(), FatalError> {
        info!("output {} added", id);
        let mut out = Output::new(id, self.config.layout_params());
        if let Some(shell) = self.layer_shell_id {
            let ls_id = self.conn.new_object(&interfaces::RIVER_LAYER_SHELL_OUTPUT);
            self.conn.send_request(
                shell,
                river_layer_shell::REQ_GET_OUTPUT,
                vec![Arg::NewId(ls_id), Arg::Object(id)],
            )?;
            out.layer_shell_id = Some(ls_id);
            if self.output_order.is_empty() {
                self.conn
                    .send_request(ls_id, river_layer_shell_output::REQ_SET_DEFAULT, vec![])?;
            }
        }

        // Adopt windows stranded by a removed output, keeping their
        // workspace index.
        for (win, ws_idx) in std::mem::take(&mut self.orphans) {
            out.workspaces[ws_idx].add_window(win);
            self.locations.insert(win, (id, ws_idx));
        }

        self.outputs.insert(id, out);
        self.output_order.push(id);
        if self.focused_output.is_none() {
            self.focused_output = Some(id);
        }
        self.dirty = true;
        Ok(())
    }

    fn on_seat_added(&mut self, id: u32) -> Result<(), FatalError> {
        info!("seat {} added", id);
        let mut seat = Seat::new(id);
        if let Some(shell) = self.layer_shell_id {
            let ls_id = self.conn.new_object(&interfaces::RIVER_LAYER_SHELL_SEAT);
            self.conn.send_request(
                shell,
                river_layer_shell::REQ_GET_SEAT,
                vec![Arg::NewId(ls_id), Arg::Object(id)],
            )?;
            seat.layer_shell_id = Some(ls_id);
        }

        for (mods, sym, action) in bindings::default_keymap(self.modifier) {
            let binding = seat.bind_key(&mut self.conn, self.xkb_bindings_id, mods, sym, action)?;
            self.actions.insert(binding, (id, action));
        }
        for (mods, button, action) in bindings::default_pointer_map(self.modifier) {
            let binding = seat.bind_pointer(&mut self.conn, mods, button)?;
            self.actions.insert(binding, (id, action));
        }

        self.seats.insert(id, seat);
        Ok(())
    }

    fn on_window_event(&mut self, event: Event) -> Result<(), FatalError> {
        let id = event.object_id;
        if !self.windows.contains_key(&id) {
            debug!("event for unknown window {}, ignoring", id);
            return Ok(());
        }
        match event.opcode {
            river_window::EVT_CLOSED => {
                self.remove_window(id)?;
            }
            river_window::EVT_DIMENSIONS_HINT => {
                let win = self.windows.get_mut(&id).unwrap();
                win.dimension_hint.min_width = event.args[0].as_int();
                win.dimension_hint.min_height = event.args[1].as_int();
                win.dimension_hint.max_width = event.args[2].as_int();
                win.dimension_hint.max_height = event.args[3].as_int();
            }
            river_window::EVT_DIMENSIONS => {
                let win = self.windows.get_mut(&id).unwrap();
                win.width = event.args[0].as_int();
                win.height = event.args[1].as_int();
                if !win.mapped {
                    win.mapped = true;
                    if win.should_auto_float() {
                        win.floating = true;
                    }
                    debug!("window {} mapped at {}x{}", id, win.width, win.height);
                    self.focus_window(id);
                    self.ipc_events.push_back(IpcEvent::WindowNew { id });
                }
                self.dirty = true;
            }
            river_window::EVT_APP_ID => {
                self.windows.get_mut(&id).unwrap().app_id =
                    event.args[0].as_str().map(str::to_owned);
            }
            river_window::EVT_TITLE => {
                self.windows.get_mut(&id).unwrap().title =
                    event.args[0].as_str().map(str::to_owned);
                self.mark_decoration_dirty(id);
            }
            river_window::EVT_PARENT => {
                let parent = event.args[0].as_uint();
                let win = self.windows.get_mut(&id).unwrap();
                win.parent = (parent != 0).then_some(parent);
            }
            river_window::EVT_DECORATION_HINT => {
                self.windows.get_mut(&id).unwrap().decoration_hint =
                    DecorationHint::from_raw(event.args[0].as_uint());
            }
            river_window::EVT_POINTER_MOVE_REQUESTED => {
                let seat = event.args[0].as_uint();
                self.windows.get_mut(&id).unwrap().pending.pointer_move = Some(seat);
                self.dirty = true;
            }
            river_window::EVT_POINTER_RESIZE_REQUESTED => {
                let seat = event.args[0].as_uint();
                let edges = WindowEdges::from_bits_truncate(event.args[1].as_uint());
                self.windows.get_mut(&id).unwrap().pending.pointer_resize = Some((seat, edges));
                self.dirty = true;
            }
            river_window::EVT_MAXIMIZE_REQUESTED => {
                self.windows.get_mut(&id).unwrap().pending.maximize = true;
                self.flag_urgent_if_hidden(id);
                self.dirty = true;
            }
            river_window::EVT_UNMAXIMIZE_REQUESTED => {
                self.windows.get_mut(&id).unwrap().pending.unmaximize = true;
                self.dirty = true;
            }
            river_window::EVT_FULLSCREEN_REQUESTED => {
                let output = event.args[0].as_uint();
                self.windows.get_mut(&id).unwrap().pending.fullscreen = Some(output);
                self.flag_urgent_if_hidden(id);
                self.dirty = true;
            }
            river_window::EVT_EXIT_FULLSCREEN_REQUESTED => {
                self.windows.get_mut(&id).unwrap().pending.exit_fullscreen = true;
                self.dirty = true;
            }
            river_window::EVT_MINIMIZE_REQUESTED => {
                self.windows.get_mut(&id).unwrap().pending.minimize = true;
                self.dirty = true;
            }
            _ => {}
        }
        Ok(())
    }

    fn on_output_event(&mut self, event: Event) -> Result<(), FatalError> {
        let id = event.object_id;
        if !self.outputs.contains_key(&id) {
            debug!("event for unknown output {}, ignoring", id);
            return Ok(());
        }
        match event.opcode {
            river_output::EVT_REMOVED => self.remove_output(id)?,
            river_output::EVT_WL_OUTPUT => {
                let name = event.args[0].as_uint();
                self.bind_wl_output(name)?;
                let info = self.wl_outputs.get(&name).cloned().unwrap_or_default();
                let out = self.outputs.get_mut(&id).unwrap();
                out.wl_output_global = Some(name);
                out.name = info.name;
                if info.scale > 0 {
                    out.scale = info.scale;
                }
            }
            river_output::EVT_POSITION => {
                let out = self.outputs.get_mut(&id).unwrap();
                out.x = event.args[0].as_int();
                out.y = event.args[1].as_int();
                self.dirty = true;
            }
            river_output::EVT_DIMENSIONS => {
                let out = self.outputs.get_mut(&id).unwrap();
                out.width = event.args[0].as_int();
                out.height = event.args[1].as_int();
                debug!("output {} is {}x{}", id, out.width, out.height);
                self.dirty = true;
            }
            _ => {}
        }
        Ok(())
    }

    fn on_seat_event(&mut self, event: Event) -> Result<(), FatalError> {
        let id = event.object_id;
        if !self.seats.contains_key(&id) {
            debug!("event for unknown seat {}, ignoring", id);
            return Ok(());
        }
        match event.opcode {
            river_seat::EVT_REMOVED => self.remove_seat(id)?,
            river_seat::EVT_WL_SEAT => {
                let name = event.args[0].as_uint();
                self.bind_wl_seat(name)?;
            }
            river_seat::EVT_POINTER_ENTER => {
                let window = event.args[0].as_uint();
                self.seats.get_mut(&id).unwrap().pointer_window = Some(window);
                if self.config.input.focus_follows_mouse
                    && self.op.is_none()
                    && self.windows.contains_key(&window)
                {
                    self.focus_window(window);
                }
            }
            river_seat::EVT_POINTER_LEAVE => {
                self.seats.get_mut(&id).unwrap().pointer_window = None;
            }
            river_seat::EVT_WINDOW_INTERACTION => {
                let window = event.args[0].as_uint();
                if self.windows.contains_key(&window) {
                    self.focus_window(window);
                }
            }
            river_seat::EVT_OP_DELTA => {
                let dx = event.args[0].as_int();
                let dy = event.args[1].as_int();
                self.on_op_delta(id, dx, dy);
            }
            river_seat::EVT_OP_RELEASE => self.end_operation(id)?,
            _ => {}
        }
        Ok(())
    }

    fn on_binding_event(&mut self, event: Event) -> Result<(), FatalError> {
        // Pressed and released share opcode values across both binding
        // interfaces.
        if event.opcode != river_xkb_binding::EVT_PRESSED
            && event.opcode != river_pointer_binding::EVT_PRESSED
        {
            return Ok(());
        }
        let Some(&(seat, action)) = self.actions.get(&event.object_id) else {
            debug!("press on unknown binding {}", event.object_id);
            return Ok(());
        };
        self.apply_action(action, Some(seat))
    }

    fn on_layer_shell_output_event(&mut self, event: Event) -> Result<(), FatalError> {
        if event.opcode != river_layer_shell_output::EVT_NON_EXCLUSIVE_AREA {
            return Ok(());
        }
        let area = Area::new(
            event.args[0].as_int(),
            event.args[1].as_int(),
            event.args[2].as_int(),
            event.args[3].as_int(),
        );
        let target = self
            .outputs
            .values_mut()
            .find(|o| o.layer_shell_id == Some(event.object_id));
        if let Some(out) = target {
            out.non_exclusive_area = Some(area);
            self.dirty = true;
        }
        Ok(())
    }

    fn on_wl_output_event(&mut self, event: Event) -> Result<(), FatalError> {
        let Some(&name) = self.wl_output_ids.get(&event.object_id) else {
            return Ok(());
        };
        let info = self.wl_outputs.entry(name).or_default();
        match event.opcode {
            wl_output::EVT_NAME => info.name = event.args[0].as_str().map(str::to_owned),
            wl_output::EVT_SCALE => info.scale = event.args[0].as_int(),
            _ => return Ok(()),
        }
        let info = info.clone();
        for out in self.outputs.values_mut() {
            if out.wl_output_global == Some(name) {
                out.name = info.name.clone();
                if info.scale > 0 {
                    out.scale = info.scale;
                }
            }
        }
        Ok(())
    }

    fn on_wl_seat_event(&mut self, event: Event) -> Result<(), FatalError> {
        if event.opcode != wl_seat::EVT_CAPABILITIES {
            return Ok(());
        }
        let caps = event.args[0].as_uint();
        if caps & wl_seat::CAP_KEYBOARD != 0 {
            let kb = self.conn.new_object(&interfaces::WL_KEYBOARD);
            self.conn.send_request(
                event.object_id,
                wl_seat::REQ_GET_KEYBOARD,
                vec![Arg::NewId(kb)],
            )?;
            self.input_devices.push(kb);
        }
        if caps & wl_seat::CAP_POINTER != 0 {
            let ptr = self.conn.new_object(&interfaces::WL_POINTER);
            self.conn.send_request(
                event.object_id,
                wl_seat::REQ_GET_POINTER,
                vec![Arg::NewId(ptr)],
            )?;
            self.input_devices.push(ptr);
        }
        Ok(())
    }

    // --- lifecycle helpers ---------------------------------------------

    fn bind_wl_output(&mut self, name: u32) -> Result<(), FatalError> {
        if self.wl_outputs.get(&name).is_some_and(|i| i.bound_id.is_some()) {
            return Ok(());
        }
        let Some(global) = self.conn.globals.iter().find(|g| g.name == name).cloned() else {
            return Ok(());
        };
        if global.interface != "wl_output" {
            return Ok(());
        }
        let bound = self.conn.bind_global(&global, &interfaces::WL_OUTPUT)?;
        self.wl_output_ids.insert(bound, name);
        self.wl_outputs.entry(name).or_default().bound_id = Some(bound);
        Ok(())
    }

    fn bind_wl_seat(&mut self, name: u32) -> Result<(), FatalError> {
        if self.wl_seat_ids.values().any(|&n| n == name) {
            return Ok(());
        }
        let Some(global) = self.conn.globals.iter().find(|g| g.name == name).cloned() else {
            return Ok(());
        };
        if global.interface != "wl_seat" {
            return Ok(());
        }
        let bound = self.conn.bind_global(&global, &interfaces::WL_SEAT)?;
        self.wl_seat_ids.insert(bound, name);
        Ok(())
    }

    /// Bring a window into focus: focused output, workspace slot, and the
    /// manager-wide focused window all move together. Clears urgency.
    fn focus_window(&mut self, id: u32) {
        let Some(&(out_id, ws_idx)) = self.locations.get(&id) else {
            return;
        };
        self.focused_output = Some(out_id);
        if let Some(out) = self.outputs.get_mut(&out_id) {
            out.workspaces[ws_idx].focused = Some(id);
        }
        self.focused_window = Some(id);
        if let Some(win) = self.windows.get_mut(&id) {
            win.urgent = false;
        }
        self.dirty = true;
    }

    /// A request from a window the user cannot see flags it urgent.
    fn flag_urgent_if_hidden(&mut self, id: u32) {
        let Some(&(out_id, ws_idx)) = self.locations.get(&id) else {
            return;
        };
        let hidden = self
            .outputs
            .get(&out_id)
            .is_some_and(|o| o.active_ws != ws_idx);
        if hidden {
            if let Some(win) = self.windows.get_mut(&id) {
                win.urgent = true;
                self.mark_decoration_dirty(id);
            }
        }
    }

    fn mark_decoration_dirty(&mut self, window: u32) {
        if let Some(&key) = self.locations.get(&window) {
            let key = (key.0, key.1);
            if let Some(bar) = self.tab_bars.get_mut(&key) {
                bar.dirty = true;
            }
        }
    }

    fn remove_window(&mut self, id: u32) -> Result<(), FatalError> {
        debug!("window {} closed", id);
        if let Some((out_id, ws_idx)) = self.locations.remove(&id) {
            if let Some(out) = self.outputs.get_mut(&out_id) {
                let ws = &mut out.workspaces[ws_idx];
                ws.remove_window(id);
                // The focus-fix may have picked a still-pending window;
                // fall back to the first mapped one.
                let windows = &self.windows;
                let mapped = |w: u32| windows.get(&w).is_some_and(|win| win.mapped);
                if ws.focused.is_some_and(|w| !mapped(w)) {
                    ws.focused = ws.windows.iter().copied().find(|&w| mapped(w));
                }
                if self.focused_window == Some(id) {
                    self.focused_window = ws.focused;
                }
            }
        } else {
            self.orphans.retain(|&(w, _)| w != id);
            if self.focused_window == Some(id) {
                self.focused_window = None;
            }
        }
        for seat in self.seats.values_mut() {
            if seat.pointer_window == Some(id) {
                seat.pointer_window = None;
            }
            if seat.focused_window == Some(id) {
                seat.focused_window = None;
            }
        }
        if self.op.is_some_and(|op| op.window == id) {
            self.op = None;
        }
        let stale: Vec<_> = self
            .tab_bars
            .iter()
            .filter(|(_, bar)| bar.window == id)
            .map(|(&k, _)| k)
            .collect();
        for key in stale {
            if let Some(mut bar) = self.tab_bars.remove(&key) {
                let _ = bar.destroy(&mut self.conn);
            }
        }
        if let Some(mut win) = self.windows.remove(&id) {
            win.destroy(&mut self.conn)?;
        }
        self.ipc_events.push_back(IpcEvent::WindowClosed { id });
        self.dirty = true;
        Ok(())
    }

    fn remove_output(&mut self, id: u32) -> Result<(), FatalError> {
        info!("output {} removed", id);
        self.output_order.retain(|&o| o != id);
        let Some(mut gone) = self.outputs.remove(&id) else {
            return Ok(());
        };
        let stale: Vec<_> = self
            .tab_bars
            .keys()
            .filter(|(o, _)| *o == id)
            .copied()
            .collect();
        for key in stale {
            if let Some(mut bar) = self.tab_bars.remove(&key) {
                let _ = bar.destroy(&mut self.conn);
            }
        }

        // Migrate windows to the next remaining output, preserving the
        // workspace index; with no outputs left they wait in the pending
        // set.
        let target = self.output_order.first().copied();
        for (ws_idx, ws) in gone.workspaces.iter_mut().enumerate() {
            for win in ws.windows.drain(..) {
                match target {
                    Some(t) => {
                        self.outputs.get_mut(&t).unwrap().workspaces[ws_idx].add_window(win);
                        self.locations.insert(win, (t, ws_idx));
                    }
                    None => {
                        self.locations.remove(&win);
                        self.orphans.push((win, ws_idx));
                    }
                }
            }
        }

        if self.focused_output == Some(id) {
            self.focused_output = target;
            self.focused_window = target
                .and_then(|t| self.outputs.get(&t))
                .and_then(|o| o.active_workspace().focused);
        }
        self.conn.send_destructor(id, river_output::REQ_DESTROY)?;
        self.dirty = true;
        Ok(())
    }

    fn remove_seat(&mut self, id: u32) -> Result<(), FatalError> {
        info!("seat {} removed", id);
        if let Some(seat) = self.seats.remove(&id) {
            let bindings: Vec<u32> = seat.binding_ids().collect();
            for binding in bindings {
                self.actions.remove(&binding);
            }
        }
        if self.op.is_some_and(|op| op.seat == id) {
            self.op = None;
        }
        Ok(())
    }

    // --- user actions --------------------------------------------------

    /// Execute one action. Actions referencing a destroyed window are
    /// silently dropped; duplicate invocations are safe.
    pub fn apply_action(&mut self, action: Action, seat: Option<u32>) -> Result<(), FatalError> {
        debug!("action {:?}", action);
        match action {
            Action::SpawnTerminal => spawn::spawn(&self.config.programs.terminal),
            Action::SpawnLauncher => spawn::spawn(&self.config.programs.launcher),
            Action::CloseWindow => {
                if let Some(win) = self.focused_window.and_then(|id| self.windows.get(&id)) {
                    win.close(&mut self.conn)?;
                }
            }
            Action::Quit => self.quit(),
            Action::FocusNext => self.rotate_focus(1),
            Action::FocusPrev => self.rotate_focus(-1),
            Action::SwapNext => self.with_focused_workspace(|ws| ws.swap_next()),
            Action::SwapPrev => self.with_focused_workspace(|ws| ws.swap_prev()),
            Action::PromoteMaster => self.with_focused_workspace(|ws| ws.promote()),
            Action::CycleLayoutNext => self.cycle_layout(1)?,
            Action::CycleLayoutPrev => self.cycle_layout(-1)?,
            Action::ToggleFullscreen => self.toggle_fullscreen()?,
            Action::SwitchWorkspace(n) => self.switch_workspace(n as usize),
            Action::MoveToWorkspace(n) => self.move_to_workspace(n as usize),
            Action::StartMove => {
                if let Some(seat) = seat {
                    let target = self.seats.get(&seat).and_then(|s| s.pointer_window);
                    if let Some(window) = target {
                        self.start_operation(OpKind::Move, window, seat, WindowEdges::empty())?;
                    }
                }
            }
            Action::StartResize => {
                if let Some(seat) = seat {
                    let target = self.seats.get(&seat).and_then(|s| s.pointer_window);
                    if let Some(window) = target {
                        self.start_operation(
                            OpKind::Resize,
                            window,
                            seat,
                            WindowEdges::RIGHT | WindowEdges::BOTTOM,
                        )?;
                    }
                }
            }
        }
        self.flush_dirty()
    }

    fn eligible(windows: &HashMap<u32, Window>) -> impl Fn(u32) -> bool + '_ {
        |id| {
            windows
                .get(&id)
                .is_some_and(|w| w.mapped && !w.minimized)
        }
    }

    fn rotate_focus(&mut self, dir: isize) {
        let Some(out_id) = self.focused_output else { return };
        let Some(out) = self.outputs.get_mut(&out_id) else { return };
        let ws = out.active_workspace_mut();
        let windows = &self.windows;
        if dir > 0 {
            ws.focus_next(Self::eligible(windows));
        } else {
            ws.focus_prev(Self::eligible(windows));
        }
        if let Some(focused) = ws.focused {
            self.focused_window = Some(focused);
            if let Some(win) = self.windows.get_mut(&focused) {
                win.urgent = false;
            }
        }
        self.dirty = true;
    }

    fn with_focused_workspace(&mut self, f: impl FnOnce(&mut workspace::Workspace)) {
        let Some(out_id) = self.focused_output else { return };
        let Some(out) = self.outputs.get_mut(&out_id) else { return };
        f(out.active_workspace_mut());
        self.dirty = true;
    }

    fn cycle_layout(&mut self, dir: isize) -> Result<(), FatalError> {
        let Some(out_id) = self.focused_output else {
            return Ok(());
        };
        let Some(out) = self.outputs.get_mut(&out_id) else {
            return Ok(());
        };
        let ws_idx = out.active_ws;
        out.workspaces[ws_idx].cycle_layout(dir, LAYOUTS.len());
        let kind = out.workspaces[ws_idx].layout();
        debug!("workspace {} now uses {}", ws_idx + 1, kind.name());

        // Leaving tabbed tears the bar down.
        if kind != LayoutKind::Tabbed {
            if let Some(mut bar) = self.tab_bars.remove(&(out_id, ws_idx)) {
                bar.destroy(&mut self.conn).ok();
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn toggle_fullscreen(&mut self) -> Result<(), FatalError> {
        let Some(id) = self.focused_window else {
            return Ok(());
        };
        let Some(&(out_id, _)) = self.locations.get(&id) else {
            return Ok(());
        };
        let Some(win) = self.windows.get_mut(&id) else {
            return Ok(());
        };
        if win.fullscreen {
            win.leave_fullscreen(&mut self.conn)?;
        } else {
            win.enter_fullscreen(&mut self.conn, out_id)?;
        }
        self.dirty = true;
        Ok(())
    }

    fn switch_workspace(&mut self, n: usize) {
        if !(1..=workspace::WORKSPACE_COUNT).contains(&n) {
            return;
        }
        let Some(out_id) = self.focused_output else { return };
        let Some(out) = self.outputs.get_mut(&out_id) else { return };
        let old = out.active_ws + 1;
        out.active_ws = n - 1;
        self.focused_window = out.active_workspace().focused;
        let output_name = out.name.clone().unwrap_or_else(|| format!("output-{out_id}"));
        self.ipc_events.push_back(IpcEvent::WorkspaceFocus {
            output: output_name,
            current: n as u8,
            old: old as u8,
        });
        self.dirty = true;
    }

    fn move_to_workspace(&mut self, n: usize) {
        if !(1..=workspace::WORKSPACE_COUNT).contains(&n) {
            return;
        }
        let Some(id) = self.focused_window else { return };
        let Some(&(out_id, src)) = self.locations.get(&id) else { return };
        let dst = n - 1;
        if src == dst {
            return;
        }
        let Some(out) = self.outputs.get_mut(&out_id) else { return };
        out.workspaces[src].remove_window(id);
        out.workspaces[dst].add_window(id);
        self.locations.insert(id, (out_id, dst));
        // The active workspace stays; focus falls to the former neighbor.
        if out.active_ws == src {
            self.focused_window = out.workspaces[src].focused;
        }
        self.dirty = true;
    }

    // --- interactive operations ----------------------------------------

    fn start_operation(
        &mut self,
        kind: OpKind,
        window: u32,
        seat: u32,
        edges: WindowEdges,
    ) -> Result<(), FatalError> {
        if self.op.is_some() {
            return Ok(());
        }
        let Some(win) = self.windows.get(&window) else {
            return Ok(());
        };
        let start = win
            .floating_rect
            .or(win.last_geometry)
            .unwrap_or_else(|| Area::new(0, 0, win.width.max(1), win.height.max(1)));
        let op = match kind {
            OpKind::Move => Operation::new_move(window, seat, start),
            OpKind::Resize => Operation::new_resize(window, seat, start, edges),
        };
        if kind == OpKind::Resize {
            win.inform_resize_start(&mut self.conn)?;
        }
        if let Some(s) = self.seats.get(&seat) {
            s.op_start_pointer(&mut self.conn)?;
        }
        self.op = Some(op);
        self.focus_window(window);
        Ok(())
    }

    fn on_op_delta(&mut self, seat: u32, dx: i32, dy: i32) {
        let Some(op) = self.op.as_mut() else { return };
        if op.seat != seat {
            return;
        }
        let rect = op.apply_delta(dx, dy);
        let window = op.window;
        let first = !op.moved;
        op.moved = true;
        if let Some(win) = self.windows.get_mut(&window) {
            // The first motion pulls the window out of the layout.
            if first {
                win.floating = true;
            }
            win.floating_rect = Some(rect);
        }
        self.dirty = true;
    }

    fn end_operation(&mut self, seat: u32) -> Result<(), FatalError> {
        let Some(op) = self.op else {
            return Ok(());
        };
        if op.seat != seat {
            return Ok(());
        }
        self.op = None;
        if op.kind == OpKind::Resize {
            if let Some(win) = self.windows.get(&op.window) {
                win.inform_resize_end(&mut self.conn)?;
            }
        }
        if let Some(s) = self.seats.get(&seat) {
            s.op_end(&mut self.conn)?;
        }
        self.dirty = true;
        Ok(())
    }

    // --- manage / render phases ----------------------------------------

    /// Resolve pending window requests, apply focus, and propose the
    /// geometry plan for every output.
    fn on_manage(&mut self) -> Result<(), FatalError> {
        if self.session_locked {
            return self.finish_manage();
        }

        let ids: Vec<u32> = self.windows.keys().copied().collect();
        for id in ids {
            self.resolve_pending(id)?;
        }

        // Apply focus to every seat.
        let focus = self.focused_window.filter(|id| {
            self.windows
                .get(id)
                .is_some_and(|w| w.mapped && !w.minimized)
        });
        let seat_ids: Vec<u32> = self.seats.keys().copied().collect();
        for seat_id in seat_ids {
            let seat = self.seats.get_mut(&seat_id).unwrap();
            match focus {
                Some(window) => seat.focus_window(&mut self.conn, window)?,
                None => seat.clear_focus(&mut self.conn)?,
            }
        }

        // Propose dimensions for every output's active workspace.
        for out_id in self.output_order.clone() {
            let Some(out) = self.outputs.get(&out_id) else { continue };
            if out.area().is_empty() {
                continue;
            }
            let kind = out.active_workspace().layout();
            let geoms = self.compute_geometries(out_id);
            for (id, geom) in geoms {
                let Some(win) = self.windows.get(&id) else { continue };
                let (width, height) = win.clamp_to_hint(geom.width, geom.height);
                win.propose_dimensions(&mut self.conn, width, height)?;
                let tiled = if win.floating || kind == LayoutKind::Floating {
                    WindowEdges::empty()
                } else {
                    WindowEdges::ALL
                };
                win.set_tiled(&mut self.conn, tiled)?;
            }
        }
        self.finish_manage()
    }

    fn finish_manage(&mut self) -> Result<(), FatalError> {
        self.conn
            .send_request(self.wm_id, river_window_manager::REQ_MANAGE_FINISH, vec![])?;
        self.phase = Phase::Idle;
        self.conn.flush()
    }

    /// Position, stack, border and show/hide every window, then redraw
    /// pending decorations.
    fn on_render(&mut self) -> Result<(), FatalError> {
        if self.session_locked {
            return self.finish_render();
        }

        for out_id in self.output_order.clone() {
            let Some(out) = self.outputs.get(&out_id) else { continue };
            if out.area().is_empty() {
                continue;
            }
            let active_ws = out.active_ws;
            let ws_focused = out.active_workspace().focused;
            let all_windows: Vec<(u32, usize)> = out
                .workspaces
                .iter()
                .enumerate()
                .flat_map(|(i, ws)| ws.windows.iter().map(move |&w| (w, i)))
                .collect();
            let geoms = self.compute_geometries(out_id);
            let placed: HashSet<u32> = geoms.iter().map(|(id, _)| *id).collect();

            let mut prev_node: Option<u32> = None;
            for (id, geom) in &geoms {
                let node = {
                    let Some(win) = self.windows.get_mut(id) else { continue };
                    win.last_geometry =
                        Some(Area::new(geom.x, geom.y, geom.width, geom.height));
                    win.node(&mut self.conn)?
                };
                self.conn.send_request(
                    node,
                    interfaces::river_node::REQ_SET_POSITION,
                    vec![Arg::Int(geom.x), Arg::Int(geom.y)],
                )?;
                match prev_node {
                    None => self.conn.send_request(
                        node,
                        interfaces::river_node::REQ_PLACE_BOTTOM,
                        vec![],
                    )?,
                    Some(prev) => self.conn.send_request(
                        node,
                        interfaces::river_node::REQ_PLACE_ABOVE,
                        vec![Arg::Object(prev)],
                    )?,
                }
                prev_node = Some(node);

                let border = self.border_config(geom.border);
                let win = self.windows.get(id).unwrap();
                win.set_borders(&mut self.conn, border)?;
                if geom.visible {
                    win.show(&mut self.conn)?;
                } else {
                    win.hide(&mut self.conn)?;
                }
            }

            // The focused window ends up on top of its stack.
            if let Some(focused) = ws_focused {
                if placed.contains(&focused) {
                    if let Some(node) = self.windows.get(&focused).and_then(|w| w.node) {
                        self.conn.send_request(
                            node,
                            interfaces::river_node::REQ_PLACE_TOP,
                            vec![],
                        )?;
                    }
                }
            }

            // Everything not placed: fullscreen windows stay visible on
            // the active workspace, the rest is hidden.
            for (id, ws_idx) in all_windows {
                if placed.contains(&id) {
                    continue;
                }
                let Some(win) = self.windows.get(&id) else { continue };
                if ws_idx == active_ws && win.fullscreen && win.mapped && !win.minimized {
                    win.show(&mut self.conn)?;
                } else {
                    win.hide(&mut self.conn)?;
                }
            }

            // A failed decoration redraw is not worth the session.
            if let Err(e) = self.update_tab_bar(out_id, active_ws) {
                warn!("tab bar update failed: {e:#}");
            }
        }
        self.finish_render()
    }

    fn finish_render(&mut self) -> Result<(), FatalError> {
        self.conn
            .send_request(self.wm_id, river_window_manager::REQ_RENDER_FINISH, vec![])?;
        self.phase = Phase::Idle;
        self.conn.flush()
    }

    fn resolve_pending(&mut self, id: u32) -> Result<(), FatalError> {
        let Some(win) = self.windows.get_mut(&id) else {
            return Ok(());
        };
        if !win.pending.any() {
            return Ok(());
        }
        let pending = std::mem::take(&mut win.pending);

        if let Some(seat) = pending.pointer_move {
            if self.seats.contains_key(&seat) {
                self.start_operation(OpKind::Move, id, seat, WindowEdges::empty())?;
            }
        }
        if let Some((seat, edges)) = pending.pointer_resize {
            if self.seats.contains_key(&seat) {
                let edges = if edges.is_empty() {
                    WindowEdges::RIGHT | WindowEdges::BOTTOM
                } else {
                    edges
                };
                self.start_operation(OpKind::Resize, id, seat, edges)?;
            }
        }
        if let Some(output) = pending.fullscreen {
            let target = if output != 0 && self.outputs.contains_key(&output) {
                Some(output)
            } else {
                self.locations.get(&id).map(|&(o, _)| o)
            };
            if let (Some(target), Some(win)) = (target, self.windows.get_mut(&id)) {
                win.enter_fullscreen(&mut self.conn, target)?;
            }
        }
        if pending.exit_fullscreen {
            if let Some(win) = self.windows.get_mut(&id) {
                win.leave_fullscreen(&mut self.conn)?;
            }
        }
        if pending.maximize {
            // Tiled layouts already fill the area; acknowledge only.
            if let Some(win) = self.windows.get(&id) {
                win.inform_maximized(&mut self.conn)?;
            }
        }
        if pending.unmaximize {
            if let Some(win) = self.windows.get(&id) {
                win.inform_unmaximized(&mut self.conn)?;
            }
        }
        if pending.minimize {
            if let Some(win) = self.windows.get_mut(&id) {
                win.minimized = true;
            }
            if self.focused_window == Some(id) {
                self.rotate_focus(1);
                if self.focused_window == Some(id) {
                    // Nothing else eligible.
                    self.focused_window = None;
                }
            }
        }
        Ok(())
    }

    /// The geometry plan for an output's active workspace: the workspace
    /// layout for tiled windows, the floating rules for windows exempt
    /// from it.
    fn compute_geometries(&self, out_id: u32) -> Vec<(u32, LayoutGeometry)> {
        let Some(out) = self.outputs.get(&out_id) else {
            return Vec::new();
        };
        let ws = out.active_workspace();
        let area = out.usable_area(self.config.layout.outer_gap as i32);
        if area.is_empty() {
            return Vec::new();
        }
        let kind = ws.layout();

        let mut tiled = Vec::new();
        let mut floating = Vec::new();
        for &id in &ws.windows {
            let Some(win) = self.windows.get(&id) else { continue };
            if !win.mapped || win.minimized || win.fullscreen {
                continue;
            }
            if kind != LayoutKind::Floating && win.floating {
                floating.push(id);
            } else {
                tiled.push(id);
            }
        }

        let floating_rects: HashMap<u32, Area> = ws
            .windows
            .iter()
            .filter_map(|id| {
                self.windows
                    .get(id)
                    .and_then(|w| w.floating_rect.map(|r| (*id, r)))
            })
            .collect();
        let urgent: HashSet<u32> = ws
            .windows
            .iter()
            .filter(|id| self.windows.get(id).is_some_and(|w| w.urgent))
            .copied()
            .collect();
        let input = LayoutInput {
            focused: ws.focused,
            urgent: &urgent,
            floating: &floating_rects,
        };

        let mut geoms = layout::calculate(kind, &tiled, area, &ws.params, &input);
        if !floating.is_empty() {
            geoms.extend(layout::calculate(
                LayoutKind::Floating,
                &floating,
                area,
                &ws.params,
                &input,
            ));
        }
        geoms
    }

    fn border_config(&self, kind: BorderKind) -> BorderConfig {
        let width = self.config.appearance.border_width as i32;
        match kind {
            BorderKind::None => BorderConfig::solid(0, 0),
            BorderKind::Normal => BorderConfig::solid(width, self.config.appearance.border_color),
            BorderKind::Focused => {
                BorderConfig::solid(width, self.config.appearance.focused_border_color)
            }
            BorderKind::Urgent => {
                BorderConfig::solid(width, self.config.appearance.urgent_border_color)
            }
        }
    }

    /// Keep the tab bar of the active workspace in sync: exists exactly
    /// when the tabbed layout is active and has windows, attached above
    /// the focused window, repainted at most once per pending change.
    fn update_tab_bar(&mut self, out_id: u32, ws_idx: usize) -> Result<()> {
        let key = (out_id, ws_idx);
        let Some(out) = self.outputs.get(&out_id) else {
            return Ok(());
        };
        let ws = &out.workspaces[ws_idx];
        let focused = ws.focused;
        let tabbed = ws.layout() == LayoutKind::Tabbed && focused.is_some();
        if !tabbed {
            if let Some(mut bar) = self.tab_bars.remove(&key) {
                bar.destroy(&mut self.conn).ok();
            }
            return Ok(());
        }

        let area = out.usable_area(self.config.layout.outer_gap as i32);
        let rect = layout::bar_rect(area, &ws.params);
        if rect.is_empty() {
            return Ok(());
        }
        let focused = focused.unwrap();
        let tabs_data: Vec<(String, bool, bool)> = ws
            .windows
            .iter()
            .filter_map(|id| self.windows.get(id).map(|w| (w, id)))
            .filter(|(w, _)| w.mapped && !w.minimized)
            .map(|(w, id)| {
                (
                    w.title.clone().unwrap_or_else(|| "untitled".to_string()),
                    *id == focused,
                    w.urgent,
                )
            })
            .collect();
        if tabs_data.is_empty() {
            return Ok(());
        }

        // Recreate when the anchor window or width changed.
        let recreate = match self.tab_bars.get(&key) {
            Some(bar) => bar.window != focused,
            None => true,
        };
        if recreate {
            if let Some(mut old) = self.tab_bars.remove(&key) {
                old.destroy(&mut self.conn).ok();
            }
            let bar = TabBar::create(
                &mut self.conn,
                self.compositor_id,
                self.shm_id,
                focused,
                rect.width,
                rect.height,
            )?;
            self.tab_bars.insert(key, bar);
        }

        let bar = self.tab_bars.get_mut(&key).unwrap();
        if bar.width() != rect.width {
            bar.resize(&mut self.conn, rect.width)?;
        }
        if bar.dirty {
            let tabs: Vec<Tab> = tabs_data
                .iter()
                .map(|(title, focused, urgent)| Tab {
                    title,
                    focused: *focused,
                    urgent: *urgent,
                })
                .collect();
            bar.render(&mut self.conn, &self.painter, &tabs)?;
        }
        Ok(())
    }

    // --- read-only views for the IPC server ----------------------------

    pub fn outputs_in_order(&self) -> impl Iterator<Item = &Output> {
        self.output_order.iter().filter_map(|id| self.outputs.get(id))
    }

    pub fn window(&self, id: u32) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn focused_window_id(&self) -> Option<u32> {
        self.focused_window
    }

    pub fn focused_output_id(&self) -> Option<u32> {
        self.focused_output
    }
}

fn same(a: &'static Interface, b: &'static Interface) -> bool {
    std::ptr::eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    /// A manager wired to a socketpair; the far end is returned so writes
    /// have somewhere to go.
    fn fixture() -> (Wm, UnixStream) {
        let (client, server) = UnixStream::pair().unwrap();
        let mut conn = Connection::from_stream(client).unwrap();
        let compositor_id = conn.new_object(&interfaces::WL_COMPOSITOR);
        let shm_id = conn.new_object(&interfaces::WL_SHM);
        let wm_id = conn.new_object(&interfaces::RIVER_WINDOW_MANAGER);
        let xkb_bindings_id = conn.new_object(&interfaces::RIVER_XKB_BINDINGS);
        let config = Config::default();
        let painter = FlatPainter { background: 0, focused: 0, urgent: 0 };
        let wm = Wm {
            conn,
            modifier: Modifiers::SUPER,
            wm_id,
            xkb_bindings_id,
            layer_shell_id: None,
            compositor_id,
            shm_id,
            windows: HashMap::new(),
            outputs: HashMap::new(),
            output_order: Vec::new(),
            seats: HashMap::new(),
            locations: HashMap::new(),
            orphans: Vec::new(),
            wl_outputs: HashMap::new(),
            wl_output_ids: HashMap::new(),
            wl_seat_ids: HashMap::new(),
            input_devices: Vec::new(),
            focused_output: None,
            focused_window: None,
            phase: Phase::Idle,
            session_locked: false,
            running: true,
            exit_code: 0,
            dirty: false,
            op: None,
            actions: HashMap::new(),
            tab_bars: HashMap::new(),
            painter,
            ipc_events: VecDeque::new(),
            config,
        };
        (wm, server)
    }

    fn manager_event(wm: &Wm, opcode: u16, args: Vec<Arg>) -> Event {
        Event {
            object_id: wm.wm_id,
            opcode,
            interface: &interfaces::RIVER_WINDOW_MANAGER,
            args,
        }
    }

    fn add_output(wm: &mut Wm, id: u32) {
        let ev = manager_event(wm, river_window_manager::EVT_OUTPUT, vec![Arg::NewId(id)]);
        wm.dispatch(ev).unwrap();
        let out = wm.outputs.get_mut(&id).unwrap();
        out.width = 1920;
        out.height = 1080;
    }

    fn add_window(wm: &mut Wm, id: u32) {
        let ev = manager_event(wm, river_window_manager::EVT_WINDOW, vec![Arg::NewId(id)]);
        wm.dispatch(ev).unwrap();
        // First dimensions ack maps the window.
        let ev = Event {
            object_id: id,
            opcode: river_window::EVT_DIMENSIONS,
            interface: &interfaces::RIVER_WINDOW,
            args: vec![Arg::Int(800), Arg::Int(600)],
        };
        wm.dispatch(ev).unwrap();
    }

    fn close_window(wm: &mut Wm, id: u32) {
        let ev = Event {
            object_id: id,
            opcode: river_window::EVT_CLOSED,
            interface: &interfaces::RIVER_WINDOW,
            args: vec![],
        };
        wm.dispatch(ev).unwrap();
    }

    /// Every window sits in exactly one workspace on exactly one output.
    fn assert_single_location(wm: &Wm) {
        for &id in wm.windows.keys() {
            let holders: usize = wm
                .outputs
                .values()
                .flat_map(|o| o.workspaces.iter())
                .filter(|ws| ws.contains(id))
                .count();
            let orphaned = wm.orphans.iter().filter(|&&(w, _)| w == id).count();
            assert_eq!(holders + orphaned, 1, "window {id} is in {holders} workspaces");
        }
    }

    #[test]
    fn new_windows_join_the_focused_workspace_and_map_on_dimensions() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 200);

        assert!(wm.windows[&200].mapped);
        assert_eq!(wm.focused_window, Some(200));
        assert_eq!(wm.locations[&200], (100, 0));
        assert_single_location(&wm);
    }

    #[test]
    fn pending_windows_never_hold_workspace_focus() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        let ev = manager_event(&wm, river_window_manager::EVT_WINDOW, vec![Arg::NewId(7)]);
        wm.dispatch(ev).unwrap();

        // Created but not yet mapped: no focus anywhere.
        assert!(!wm.windows[&7].mapped);
        assert_eq!(wm.outputs[&100].workspaces[0].focused, None);
        assert_eq!(wm.focused_window, None);

        let ev = Event {
            object_id: 7,
            opcode: river_window::EVT_DIMENSIONS,
            interface: &interfaces::RIVER_WINDOW,
            args: vec![Arg::Int(640), Arg::Int(480)],
        };
        wm.dispatch(ev).unwrap();
        assert_eq!(wm.outputs[&100].workspaces[0].focused, Some(7));
        assert_eq!(wm.focused_window, Some(7));
    }

    #[test]
    fn focus_chain_survives_a_close_storm() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        for id in [1, 2, 3] {
            add_window(&mut wm, id);
        }
        wm.focus_window(2);

        close_window(&mut wm, 2);
        assert_eq!(wm.focused_window, Some(3));
        close_window(&mut wm, 3);
        assert_eq!(wm.focused_window, Some(1));
        close_window(&mut wm, 1);
        assert_eq!(wm.focused_window, None);
        assert_single_location(&wm);
    }

    #[test]
    fn move_to_workspace_keeps_mapping_and_fixes_focus() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 1);
        add_window(&mut wm, 2);
        wm.focus_window(1);

        wm.apply_action(Action::MoveToWorkspace(3), None).unwrap();

        let out = &wm.outputs[&100];
        assert!(!out.workspaces[0].contains(1));
        assert!(out.workspaces[2].contains(1));
        assert!(wm.windows[&1].mapped);
        // Active workspace unchanged, focus moved to the former neighbor.
        assert_eq!(out.active_ws, 0);
        assert_eq!(wm.focused_window, Some(2));
        assert_eq!(wm.locations[&1], (100, 2));
        assert_single_location(&wm);
    }

    #[test]
    fn switch_workspace_focuses_its_last_focused_window() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 1);
        wm.apply_action(Action::MoveToWorkspace(2), None).unwrap();
        assert_eq!(wm.focused_window, None);

        wm.apply_action(Action::SwitchWorkspace(2), None).unwrap();
        assert_eq!(wm.outputs[&100].active_ws, 1);
        assert_eq!(wm.focused_window, Some(1));
    }

    #[test]
    fn output_removal_migrates_windows_preserving_workspace_index() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_output(&mut wm, 101);
        add_window(&mut wm, 1);
        wm.apply_action(Action::MoveToWorkspace(5), None).unwrap();

        let ev = Event {
            object_id: 100,
            opcode: river_output::EVT_REMOVED,
            interface: &interfaces::RIVER_OUTPUT,
            args: vec![],
        };
        wm.dispatch(ev).unwrap();

        assert_eq!(wm.locations[&1], (101, 4));
        assert!(wm.outputs[&101].workspaces[4].contains(1));
        assert_single_location(&wm);
    }

    #[test]
    fn last_output_removal_strands_windows_until_one_returns() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 1);

        let ev = Event {
            object_id: 100,
            opcode: river_output::EVT_REMOVED,
            interface: &interfaces::RIVER_OUTPUT,
            args: vec![],
        };
        wm.dispatch(ev).unwrap();
        assert!(wm.outputs.is_empty());
        assert_eq!(wm.orphans, vec![(1, 0)]);

        add_output(&mut wm, 102);
        assert_eq!(wm.locations[&1], (102, 0));
        assert_single_location(&wm);
    }

    #[test]
    fn quit_twice_is_equivalent_to_once() {
        let (mut wm, _server) = fixture();
        wm.apply_action(Action::Quit, None).unwrap();
        assert!(!wm.running());
        assert_eq!(wm.exit_code(), 0);
        wm.apply_action(Action::Quit, None).unwrap();
        assert!(!wm.running());
        assert_eq!(wm.exit_code(), 0);
    }

    #[test]
    fn unavailable_sets_exit_code_one() {
        let (mut wm, _server) = fixture();
        let ev = manager_event(&wm, river_window_manager::EVT_UNAVAILABLE, vec![]);
        wm.dispatch(ev).unwrap();
        assert!(!wm.running());
        assert_eq!(wm.exit_code(), 1);
    }

    #[test]
    fn focus_rotation_skips_unmapped_windows() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        for id in [1, 2, 3] {
            add_window(&mut wm, id);
        }
        // Window 2 loses its mapped state (e.g. minimized).
        wm.windows.get_mut(&2).unwrap().minimized = true;
        wm.focus_window(1);

        wm.apply_action(Action::FocusNext, None).unwrap();
        assert_eq!(wm.focused_window, Some(3));
        wm.apply_action(Action::FocusNext, None).unwrap();
        assert_eq!(wm.focused_window, Some(1));
    }

    #[test]
    fn manage_phase_proposes_scenario_c_geometry() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        let out = wm.outputs.get_mut(&100).unwrap();
        out.width = 1008; // 1000 usable after the 4 px outer gap
        out.height = 1008;
        for ws in out.workspaces.iter_mut() {
            ws.params.inner_gap = 10;
        }
        for id in [1, 2, 3] {
            add_window(&mut wm, id);
        }

        let geoms = wm.compute_geometries(100);
        let rects: Vec<_> = geoms.iter().map(|(_, g)| (g.x, g.y, g.width, g.height)).collect();
        assert_eq!(rects[0], (4, 4, 495, 1000));
        assert_eq!(rects[1], (509, 4, 495, 495));
        assert_eq!(rects[2], (509, 509, 495, 495));
    }

    #[test]
    fn fullscreen_windows_are_skipped_by_the_layout() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 1);
        add_window(&mut wm, 2);
        wm.focus_window(1);
        wm.apply_action(Action::ToggleFullscreen, None).unwrap();
        assert!(wm.windows[&1].fullscreen);

        let geoms = wm.compute_geometries(100);
        assert_eq!(geoms.len(), 1);
        assert_eq!(geoms[0].0, 2);

        // Toggling back restores it.
        wm.apply_action(Action::ToggleFullscreen, None).unwrap();
        assert!(!wm.windows[&1].fullscreen);
        assert_eq!(wm.compute_geometries(100).len(), 2);
    }

    #[test]
    fn gesture_delta_floats_the_window() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 1);
        let seat_ev = manager_event(&wm, river_window_manager::EVT_SEAT, vec![Arg::NewId(50)]);
        wm.dispatch(seat_ev).unwrap();
        wm.seats.get_mut(&50).unwrap().pointer_window = Some(1);
        wm.windows.get_mut(&1).unwrap().last_geometry = Some(Area::new(10, 10, 400, 300));

        wm.apply_action(Action::StartMove, Some(50)).unwrap();
        assert!(wm.op.is_some());
        assert!(!wm.windows[&1].floating);

        wm.on_op_delta(50, 25, 35);
        let win = &wm.windows[&1];
        assert!(win.floating);
        assert_eq!(win.floating_rect, Some(Area::new(35, 45, 400, 300)));

        wm.end_operation(50).unwrap();
        assert!(wm.op.is_none());
    }

    #[test]
    fn minimize_request_resolves_during_manage() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 1);
        add_window(&mut wm, 2);
        wm.focus_window(1);

        let ev = Event {
            object_id: 1,
            opcode: river_window::EVT_MINIMIZE_REQUESTED,
            interface: &interfaces::RIVER_WINDOW,
            args: vec![],
        };
        wm.dispatch(ev).unwrap();
        let ev = manager_event(&wm, river_window_manager::EVT_MANAGE_START, vec![]);
        wm.dispatch(ev).unwrap();

        assert!(wm.windows[&1].minimized);
        assert_eq!(wm.focused_window, Some(2));
        assert_eq!(wm.phase, Phase::Idle);
    }

    #[test]
    fn urgent_flag_set_for_requests_from_hidden_workspaces() {
        let (mut wm, _server) = fixture();
        add_output(&mut wm, 100);
        add_window(&mut wm, 1);
        wm.apply_action(Action::MoveToWorkspace(4), None).unwrap();

        let ev = Event {
            object_id: 1,
            opcode: river_window::EVT_FULLSCREEN_REQUESTED,
            interface: &interfaces::RIVER_WINDOW,
            args: vec![Arg::Object(0)],
        };
        wm.dispatch(ev).unwrap();
        assert!(wm.windows[&1].urgent);

        // Focusing it clears the flag.
        wm.apply_action(Action::SwitchWorkspace(4), None).unwrap();
        wm.focus_window(1);
        assert!(!wm.windows[&1].urgent);
    }
}
