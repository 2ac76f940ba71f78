//! IPC Module
//!
//! An i3-compatible status socket so bars and scripts (Waybar, i3status)
//! can query workspaces and outputs, subscribe to workspace events, and
//! issue a small command set. Framing is the i3 protocol: a 6-byte magic,
//! then little-endian payload length and message type, then JSON.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::wm::bindings::Action;
use crate::wm::workspace::WORKSPACE_COUNT;
use crate::wm::Wm;

const MAGIC: &[u8; 6] = b"i3-ipc";
const HEADER_LEN: usize = 14;

mod msg_type {
    pub const RUN_COMMAND: u32 = 0;
    pub const GET_WORKSPACES: u32 = 1;
    pub const SUBSCRIBE: u32 = 2;
    pub const GET_OUTPUTS: u32 = 3;
    pub const GET_TREE: u32 = 4;
    pub const GET_VERSION: u32 = 7;

    pub const EVENT_WORKSPACE: u32 = 0x8000_0000;
    pub const EVENT_WINDOW: u32 = 0x8000_0003;
}

/// State changes broadcast to subscribed clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcEvent {
    WorkspaceFocus { output: String, current: u8, old: u8 },
    WindowNew { id: u32 },
    WindowClosed { id: u32 },
}

struct IpcClient {
    stream: UnixStream,
    subscriptions: Vec<String>,
    buf: Vec<u8>,
}

pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
    clients: Vec<IpcClient>,
}

fn socket_path() -> Result<PathBuf> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").context("XDG_RUNTIME_DIR is not set")?;
    let display = std::env::var("WAYLAND_DISPLAY").unwrap_or_else(|_| "wayland-0".into());
    Ok(PathBuf::from(runtime_dir).join(format!("rift-{display}.sock")))
}

impl IpcServer {
    pub fn start() -> Result<Self> {
        let socket_path = socket_path()?;
        if socket_path.exists() {
            std::fs::remove_file(&socket_path).context("failed to remove stale ipc socket")?;
        }
        let listener = UnixListener::bind(&socket_path).context("failed to bind ipc socket")?;
        listener.set_nonblocking(true)?;
        info!("ipc listening on {:?}", socket_path);
        Ok(Self { listener, socket_path, clients: Vec::new() })
    }

    /// Accept and service clients without blocking. Returns the actions
    /// requested via RUN_COMMAND, for the manager to apply.
    pub fn poll(&mut self, wm: &Wm) -> Vec<Action> {
        while let Ok((stream, _)) = self.listener.accept() {
            if stream.set_nonblocking(true).is_ok() {
                debug!("ipc client connected");
                self.clients.push(IpcClient {
                    stream,
                    subscriptions: Vec::new(),
                    buf: Vec::new(),
                });
            }
        }

        let mut actions = Vec::new();
        let mut closed = Vec::new();
        for (idx, client) in self.clients.iter_mut().enumerate() {
            match service_client(client, wm, &mut actions) {
                Ok(alive) if alive => {}
                _ => closed.push(idx),
            }
        }
        for idx in closed.into_iter().rev() {
            debug!("ipc client disconnected");
            self.clients.remove(idx);
        }
        actions
    }

    /// Push an event to every client subscribed to its category.
    pub fn broadcast(&mut self, event: &IpcEvent) {
        let (category, msg_type, payload) = match event {
            IpcEvent::WorkspaceFocus { output, current, old } => (
                "workspace",
                msg_type::EVENT_WORKSPACE,
                json!({
                    "change": "focus",
                    "current": { "num": current, "name": current.to_string(),
                                 "visible": true, "focused": true, "output": output },
                    "old": { "num": old, "name": old.to_string(),
                             "visible": false, "focused": false, "output": output },
                }),
            ),
            IpcEvent::WindowNew { id } => (
                "window",
                msg_type::EVENT_WINDOW,
                json!({ "change": "new", "container": { "id": id } }),
            ),
            IpcEvent::WindowClosed { id } => (
                "window",
                msg_type::EVENT_WINDOW,
                json!({ "change": "close", "container": { "id": id } }),
            ),
        };
        self.clients.retain_mut(|client| {
            if !client.subscriptions.iter().any(|s| s == category) {
                return true;
            }
            send_frame(&mut client.stream, msg_type, &payload).is_ok()
        });
    }

    pub fn shutdown(&mut self) {
        self.clients.clear();
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            debug!("failed to remove ipc socket: {e}");
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Read whatever the client has sent and answer complete requests.
/// Returns `false` when the client hung up.
fn service_client(client: &mut IpcClient, wm: &Wm, actions: &mut Vec<Action>) -> Result<bool> {
    let mut chunk = [0u8; 4096];
    loop {
        match client.stream.read(&mut chunk) {
            Ok(0) => return Ok(false),
            Ok(n) => client.buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e.into()),
        }
    }

    while client.buf.len() >= HEADER_LEN {
        if client.buf[..6] != MAGIC[..] {
            warn!("ipc client sent bad magic, dropping");
            return Ok(false);
        }
        let len = u32::from_le_bytes(client.buf[6..10].try_into().unwrap()) as usize;
        let kind = u32::from_le_bytes(client.buf[10..14].try_into().unwrap());
        if client.buf.len() < HEADER_LEN + len {
            break;
        }
        let payload: Vec<u8> = client.buf[HEADER_LEN..HEADER_LEN + len].to_vec();
        client.buf.drain(..HEADER_LEN + len);

        let reply = match kind {
            msg_type::GET_WORKSPACES => get_workspaces(wm),
            msg_type::GET_OUTPUTS => get_outputs(wm),
            msg_type::GET_TREE => get_tree(wm),
            msg_type::GET_VERSION => json!({
                "human_readable": concat!("rift ", env!("CARGO_PKG_VERSION")),
                "major": 0, "minor": 1, "patch": 0,
                "loaded_config_file_name": "",
            }),
            msg_type::SUBSCRIBE => {
                let events: Vec<String> =
                    serde_json::from_slice(&payload).unwrap_or_default();
                debug!("ipc client subscribed to {:?}", events);
                for event in events {
                    if !client.subscriptions.contains(&event) {
                        client.subscriptions.push(event);
                    }
                }
                json!({ "success": true })
            }
            msg_type::RUN_COMMAND => {
                let command = String::from_utf8_lossy(&payload);
                match parse_command(command.trim()) {
                    Some(action) => {
                        actions.push(action);
                        json!([{ "success": true }])
                    }
                    None => {
                        json!([{ "success": false,
                                 "error": format!("unknown command: {command}") }])
                    }
                }
            }
            other => json!([{ "success": false, "error": format!("unknown type {other}") }]),
        };
        send_frame(&mut client.stream, kind, &reply)?;
    }
    Ok(true)
}

fn send_frame(stream: &mut UnixStream, kind: u32, payload: &Value) -> Result<()> {
    let data = serde_json::to_vec(payload)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + data.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
    frame.extend_from_slice(&kind.to_le_bytes());
    frame.extend_from_slice(&data);
    stream.write_all(&frame)?;
    Ok(())
}

/// The i3 command subset this manager accepts.
fn parse_command(command: &str) -> Option<Action> {
    match command {
        "kill" => return Some(Action::CloseWindow),
        "fullscreen" => return Some(Action::ToggleFullscreen),
        "focus next" => return Some(Action::FocusNext),
        "focus prev" => return Some(Action::FocusPrev),
        "swap next" => return Some(Action::SwapNext),
        "swap prev" => return Some(Action::SwapPrev),
        "layout toggle" => return Some(Action::CycleLayoutNext),
        _ => {}
    }
    // workspace "N" / workspace number N
    let mut parts = command.split_whitespace();
    if parts.next()? != "workspace" {
        return None;
    }
    let last = command.split_whitespace().last()?;
    let n: u8 = last.trim_matches(&['"', '\''][..]).parse().ok()?;
    (1..=WORKSPACE_COUNT as u8)
        .contains(&n)
        .then_some(Action::SwitchWorkspace(n))
}

fn get_workspaces(wm: &Wm) -> Value {
    let mut list = Vec::new();
    for out in wm.outputs_in_order() {
        let output_name = out
            .name
            .clone()
            .unwrap_or_else(|| format!("output-{}", out.id));
        for (idx, ws) in out.workspaces.iter().enumerate() {
            let visible = idx == out.active_ws;
            let urgent = ws
                .windows
                .iter()
                .any(|id| wm.window(*id).is_some_and(|w| w.urgent));
            list.push(json!({
                "num": idx + 1,
                "name": (idx + 1).to_string(),
                "visible": visible,
                "focused": visible && Some(out.id) == wm.focused_output_id(),
                "urgent": urgent,
                "rect": { "x": out.x, "y": out.y, "width": out.width, "height": out.height },
                "output": output_name,
                "layout": ws.layout().name(),
            }));
        }
    }
    Value::Array(list)
}

fn get_outputs(wm: &Wm) -> Value {
    let list: Vec<Value> = wm
        .outputs_in_order()
        .map(|out| {
            json!({
                "name": out.name.clone().unwrap_or_else(|| format!("output-{}", out.id)),
                "active": true,
                "current_workspace": (out.active_ws + 1).to_string(),
                "scale": out.scale,
                "rect": { "x": out.x, "y": out.y, "width": out.width, "height": out.height },
            })
        })
        .collect();
    Value::Array(list)
}

fn get_tree(wm: &Wm) -> Value {
    let outputs: Vec<Value> = wm
        .outputs_in_order()
        .map(|out| {
            let workspaces: Vec<Value> = out
                .workspaces
                .iter()
                .enumerate()
                .map(|(idx, ws)| {
                    let windows: Vec<Value> = ws
                        .windows
                        .iter()
                        .map(|&id| {
                            let window = wm.window(id);
                            let title = window
                                .and_then(|w| w.title.clone())
                                .unwrap_or_else(|| "unknown".into());
                            let app_id = window.and_then(|w| w.app_id.clone());
                            json!({
                                "id": id,
                                "name": title,
                                "app_id": app_id,
                                "type": "con",
                                "focused": Some(id) == wm.focused_window_id(),
                            })
                        })
                        .collect();
                    json!({
                        "id": 1000 + idx + 1,
                        "num": idx + 1,
                        "name": (idx + 1).to_string(),
                        "type": "workspace",
                        "focused": idx == out.active_ws,
                        "visible": idx == out.active_ws,
                        "urgent": false,
                        "nodes": windows,
                        "floating_nodes": [],
                    })
                })
                .collect();
            json!({
                "id": out.id,
                "name": out.name.clone().unwrap_or_else(|| format!("output-{}", out.id)),
                "type": "output",
                "active": true,
                "nodes": workspaces,
                "floating_nodes": [],
            })
        })
        .collect();
    json!({ "id": 0, "name": "root", "type": "root", "nodes": outputs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_actions() {
        assert_eq!(parse_command("kill"), Some(Action::CloseWindow));
        assert_eq!(parse_command("fullscreen"), Some(Action::ToggleFullscreen));
        assert_eq!(parse_command("layout toggle"), Some(Action::CycleLayoutNext));
        assert_eq!(parse_command("workspace 3"), Some(Action::SwitchWorkspace(3)));
        assert_eq!(parse_command("workspace \"7\""), Some(Action::SwitchWorkspace(7)));
        assert_eq!(parse_command("workspace number 2"), Some(Action::SwitchWorkspace(2)));
    }

    #[test]
    fn out_of_range_and_unknown_commands_are_rejected() {
        assert_eq!(parse_command("workspace 0"), None);
        assert_eq!(parse_command("workspace 10"), None);
        assert_eq!(parse_command("workspace"), None);
        assert_eq!(parse_command("reload"), None);
    }

    #[test]
    fn frames_carry_the_magic_and_little_endian_header() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        send_frame(&mut a, msg_type::GET_VERSION, &json!({"ok": true})).unwrap();

        let mut buf = [0u8; 64];
        let n = b.read(&mut buf).unwrap();
        assert!(n > HEADER_LEN);
        assert_eq!(&buf[..6], MAGIC);
        let len = u32::from_le_bytes(buf[6..10].try_into().unwrap()) as usize;
        let kind = u32::from_le_bytes(buf[10..14].try_into().unwrap());
        assert_eq!(kind, msg_type::GET_VERSION);
        assert_eq!(len, n - HEADER_LEN);
        let value: Value = serde_json::from_slice(&buf[HEADER_LEN..n]).unwrap();
        assert_eq!(value["ok"], json!(true));
    }
}
