//! Connection Module
//!
//! Owns the stream socket to the compositor: buffered reads and writes with
//! SCM_RIGHTS descriptor passing, the object id table, and the core Wayland
//! bootstrap (display, registry, sync round-trips).

use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use rustix::event::{poll, PollFd, PollFlags};
use rustix::net::{
    recvmsg, sendmsg, RecvAncillaryBuffer, RecvAncillaryMessage, RecvFlags,
    SendAncillaryBuffer, SendAncillaryMessage, SendFlags,
};
use tracing::{debug, info, warn};

use crate::error::FatalError;
use crate::protocol::interfaces::{self, Interface};
use crate::protocol::wire::{self, Arg, FrameError, Message, HEADER_SIZE};

/// The display is always object 1; client allocations start at 2.
pub const DISPLAY_ID: u32 = 1;
const FIRST_CLIENT_ID: u32 = 2;

const RECV_CHUNK: usize = 8192;
const MAX_FDS_PER_READ: usize = 32;

/// A global advertised by the registry.
#[derive(Debug, Clone)]
pub struct GlobalInfo {
    pub name: u32,
    pub interface: String,
    pub version: u32,
}

/// A decoded event ready for dispatch, tagged with the interface of the
/// object it arrived on.
#[derive(Debug)]
pub struct Event {
    pub object_id: u32,
    pub opcode: u16,
    pub interface: &'static Interface,
    pub args: Vec<Arg>,
}

/// Resolve the compositor socket path from the environment.
pub fn socket_path() -> Result<PathBuf, FatalError> {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").ok_or_else(|| {
        FatalError::Connect("XDG_RUNTIME_DIR is not set in the environment".into())
    })?;
    let display = std::env::var("WAYLAND_DISPLAY").unwrap_or_else(|_| "wayland-0".into());
    Ok(PathBuf::from(runtime_dir).join(display))
}

pub struct Connection {
    stream: UnixStream,

    recv_buf: Vec<u8>,
    recv_fds: VecDeque<OwnedFd>,
    send_buf: Vec<u8>,
    send_fds: Vec<OwnedFd>,

    next_id: u32,
    free_ids: Vec<u32>,
    objects: HashMap<u32, &'static Interface>,

    registry_id: Option<u32>,
    pub globals: Vec<GlobalInfo>,
    /// Callback ids from `sync` whose `done` has arrived.
    done_callbacks: VecDeque<u32>,
}

impl Connection {
    /// Connect to the compositor socket resolved from the environment.
    pub fn connect() -> Result<Self, FatalError> {
        let path = socket_path()?;
        info!("connecting to compositor at {:?}", path);
        let stream = UnixStream::connect(&path)
            .map_err(|e| FatalError::Connect(format!("{:?}: {}", path, e)))?;
        Self::from_stream(stream).map_err(|e| FatalError::Connect(e.to_string()))
    }

    /// Wrap an already-connected stream. The display object (id 1) is
    /// registered immediately.
    pub fn from_stream(stream: UnixStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let mut objects = HashMap::new();
        objects.insert(DISPLAY_ID, &interfaces::WL_DISPLAY);
        Ok(Self {
            stream,
            recv_buf: Vec::with_capacity(RECV_CHUNK),
            recv_fds: VecDeque::new(),
            send_buf: Vec::new(),
            send_fds: Vec::new(),
            next_id: FIRST_CLIENT_ID,
            free_ids: Vec::new(),
            objects,
            registry_id: None,
            globals: Vec::new(),
            done_callbacks: VecDeque::new(),
        })
    }

    /// Allocate a client-side object id. Freed ids are reused only after
    /// the server acknowledged them via `delete_id`.
    pub fn allocate_id(&mut self) -> u32 {
        if let Some(id) = self.free_ids.pop() {
            id
        } else {
            let id = self.next_id;
            self.next_id += 1;
            id
        }
    }

    pub fn register(&mut self, id: u32, interface: &'static Interface) {
        self.objects.insert(id, interface);
    }

    /// Allocate an id and register it in one step.
    pub fn new_object(&mut self, interface: &'static Interface) -> u32 {
        let id = self.allocate_id();
        self.register(id, interface);
        id
    }

    /// Remove the local entry. The id stays out of circulation until the
    /// server sends `delete_id`, so a racing destructor stays harmless.
    pub fn unregister(&mut self, id: u32) {
        self.objects.remove(&id);
    }

    pub fn interface_of(&self, id: u32) -> Option<&'static Interface> {
        self.objects.get(&id).copied()
    }

    /// Queue a request for the next flush.
    pub fn send(&mut self, msg: Message) -> Result<(), FatalError> {
        let (object_id, opcode) = (msg.object_id, msg.opcode);
        let (bytes, fds) = wire::encode(msg).map_err(|source| FatalError::Protocol {
            object_id,
            opcode,
            source,
        })?;
        self.send_buf.extend_from_slice(&bytes);
        self.send_fds.extend(fds);
        Ok(())
    }

    pub fn send_request(
        &mut self,
        object_id: u32,
        opcode: u16,
        args: Vec<Arg>,
    ) -> Result<(), FatalError> {
        self.send(Message::new(object_id, opcode, args))
    }

    /// Drain the outgoing buffer. Descriptors ride on the first write that
    /// carries the message referencing them. Returns once the buffer is
    /// empty or the socket would block.
    pub fn flush(&mut self) -> Result<(), FatalError> {
        while !self.send_buf.is_empty() {
            let result = {
                let mut space = [0u8; rustix::cmsg_space!(ScmRights(MAX_FDS_PER_READ))];
                let mut ancillary = SendAncillaryBuffer::new(&mut space);
                let borrowed: Vec<_> = self.send_fds.iter().map(|fd| fd.as_fd()).collect();
                if !borrowed.is_empty() {
                    ancillary.push(SendAncillaryMessage::ScmRights(&borrowed));
                }
                sendmsg(
                    &self.stream,
                    &[io::IoSlice::new(&self.send_buf)],
                    &mut ancillary,
                    SendFlags::NOSIGNAL,
                )
            };
            match result {
                Ok(written) => {
                    self.send_buf.drain(..written);
                    self.send_fds.clear();
                }
                Err(rustix::io::Errno::AGAIN) => break,
                Err(rustix::io::Errno::INTR) => continue,
                Err(e) => return Err(FatalError::Transport(io::Error::from(e))),
            }
        }
        Ok(())
    }

    /// Read whatever the socket has, bytes and descriptors both. Returns
    /// `false` when the peer closed the connection.
    fn read_some(&mut self) -> Result<bool, FatalError> {
        let mut buf = [0u8; RECV_CHUNK];
        let mut space = [0u8; rustix::cmsg_space!(ScmRights(MAX_FDS_PER_READ))];
        loop {
            let mut ancillary = RecvAncillaryBuffer::new(&mut space);
            match recvmsg(
                &self.stream,
                &mut [io::IoSliceMut::new(&mut buf)],
                &mut ancillary,
                RecvFlags::CMSG_CLOEXEC,
            ) {
                Ok(result) => {
                    for msg in ancillary.drain() {
                        if let RecvAncillaryMessage::ScmRights(fds) = msg {
                            self.recv_fds.extend(fds);
                        }
                    }
                    if result.bytes == 0 {
                        return Ok(false);
                    }
                    self.recv_buf.extend_from_slice(&buf[..result.bytes]);
                    if result.bytes < buf.len() {
                        return Ok(true);
                    }
                }
                Err(rustix::io::Errno::AGAIN) => return Ok(true),
                Err(rustix::io::Errno::INTR) => continue,
                Err(e) => return Err(FatalError::Transport(io::Error::from(e))),
            }
        }
    }

    /// Decode all complete frames in the receive buffer. Display, registry
    /// and sync-callback traffic is handled here; everything else lands in
    /// `out` for the manager to dispatch.
    pub fn drain_events(&mut self, out: &mut VecDeque<Event>) -> Result<(), FatalError> {
        loop {
            let (object_id, opcode, size) = match wire::peek_header(&self.recv_buf) {
                Ok(Some(header)) => header,
                Ok(None) => return Ok(()),
                Err(source) => {
                    self.log_bad_frame(&source);
                    return Err(FatalError::Protocol { object_id: 0, opcode: 0, source });
                }
            };

            let Some(interface) = self.interface_of(object_id) else {
                // Racing destructor: the server may still emit events for an
                // object we already destroyed locally.
                debug!("event for unknown object {} (opcode {}), ignoring", object_id, opcode);
                self.recv_buf.drain(..size);
                continue;
            };

            let Some(desc) = interface.event(opcode) else {
                let source = FrameError::UnknownOpcode(opcode);
                warn!(
                    "unknown opcode {} on {} object {}",
                    opcode, interface.name, object_id
                );
                self.log_bad_frame(&source);
                return Err(FatalError::Protocol { object_id, opcode, source });
            };

            let args = match wire::decode_args(
                &self.recv_buf[HEADER_SIZE..size],
                desc.args,
                &mut self.recv_fds,
            ) {
                Ok(args) => args,
                Err(source) => {
                    self.log_bad_frame(&source);
                    return Err(FatalError::Protocol { object_id, opcode, source });
                }
            };
            self.recv_buf.drain(..size);

            let event = Event { object_id, opcode, interface, args };
            if !self.handle_internally(&event)? {
                out.push_back(event);
            }
        }
    }

    fn log_bad_frame(&self, source: &FrameError) {
        let head = &self.recv_buf[..self.recv_buf.len().min(32)];
        warn!("malformed frame ({}): first bytes {:02x?}", source, head);
    }

    /// Display, registry and callback events never leave the connection.
    fn handle_internally(&mut self, event: &Event) -> Result<bool, FatalError> {
        use crate::protocol::interfaces::{wl_display, wl_registry};

        if event.object_id == DISPLAY_ID {
            match event.opcode {
                wl_display::EVT_ERROR => {
                    let object_id = event.args[0].as_uint();
                    let code = event.args[1].as_uint();
                    let message = event.args[2].as_str().unwrap_or("").to_owned();
                    return Err(FatalError::Server { object_id, code, message });
                }
                wl_display::EVT_DELETE_ID => {
                    let id = event.args[0].as_uint();
                    self.objects.remove(&id);
                    self.free_ids.push(id);
                }
                _ => {}
            }
            return Ok(true);
        }

        if Some(event.object_id) == self.registry_id {
            match event.opcode {
                wl_registry::EVT_GLOBAL => {
                    let name = event.args[0].as_uint();
                    let interface = event.args[1].as_str().unwrap_or("").to_owned();
                    let version = event.args[2].as_uint();
                    debug!("global {}: {} v{}", name, interface, version);
                    self.globals.push(GlobalInfo { name, interface, version });
                }
                wl_registry::EVT_GLOBAL_REMOVE => {
                    let name = event.args[0].as_uint();
                    self.globals.retain(|g| g.name != name);
                }
                _ => {}
            }
            return Ok(true);
        }

        if std::ptr::eq(event.interface, &interfaces::WL_CALLBACK) {
            self.done_callbacks.push_back(event.object_id);
            self.unregister(event.object_id);
            return Ok(true);
        }

        Ok(false)
    }

    /// One iteration of the event loop: flush, poll with a timeout, read
    /// and decode. Returns `false` on clean close by the peer.
    pub fn run_once(
        &mut self,
        timeout_ms: i32,
        out: &mut VecDeque<Event>,
    ) -> Result<bool, FatalError> {
        self.flush()?;

        let mut flags = PollFlags::IN;
        if !self.send_buf.is_empty() {
            flags |= PollFlags::OUT;
        }
        let mut fds = [PollFd::new(&self.stream, flags)];
        match poll(&mut fds, timeout_ms) {
            Ok(_) => {}
            Err(rustix::io::Errno::INTR) => return Ok(true),
            Err(e) => return Err(FatalError::Transport(io::Error::from(e))),
        }

        let revents = fds[0].revents();
        if revents.contains(PollFlags::HUP) && !revents.contains(PollFlags::IN) {
            return Ok(false);
        }
        if revents.contains(PollFlags::OUT) {
            self.flush()?;
        }
        if revents.contains(PollFlags::IN) {
            if !self.read_some()? {
                // Peer closed; decode whatever is already buffered.
                self.drain_events(out)?;
                return Ok(false);
            }
            self.drain_events(out)?;
        }
        Ok(true)
    }

    // --- core bootstrap -----------------------------------------------

    /// Issue `wl_display.get_registry`.
    pub fn get_registry(&mut self) -> Result<u32, FatalError> {
        let id = self.new_object(&interfaces::WL_REGISTRY);
        self.registry_id = Some(id);
        self.send_request(
            DISPLAY_ID,
            interfaces::wl_display::REQ_GET_REGISTRY,
            vec![Arg::NewId(id)],
        )?;
        Ok(id)
    }

    /// Issue `wl_display.sync`, returning the callback id to wait for.
    pub fn sync(&mut self) -> Result<u32, FatalError> {
        let id = self.new_object(&interfaces::WL_CALLBACK);
        self.send_request(DISPLAY_ID, interfaces::wl_display::REQ_SYNC, vec![Arg::NewId(id)])?;
        Ok(id)
    }

    /// Block until the `done` for `callback` arrives. Events for other
    /// objects are appended to `out` in arrival order.
    pub fn roundtrip(&mut self, callback: u32, out: &mut VecDeque<Event>) -> Result<(), FatalError> {
        loop {
            if let Some(pos) = self.done_callbacks.iter().position(|&c| c == callback) {
                self.done_callbacks.remove(pos);
                return Ok(());
            }
            if !self.run_once(-1, out)? {
                return Err(FatalError::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during roundtrip",
                )));
            }
        }
    }

    /// Bind a registry global, requesting `min(server, client)` version.
    pub fn bind_global(
        &mut self,
        global: &GlobalInfo,
        interface: &'static Interface,
    ) -> Result<u32, FatalError> {
        let registry = self
            .registry_id
            .expect("bind_global called before get_registry");
        let version = global.version.min(interface.version);
        let id = self.new_object(interface);
        self.send_request(
            registry,
            interfaces::wl_registry::REQ_BIND,
            vec![
                Arg::Uint(global.name),
                Arg::Str(Some(interface.name.to_owned())),
                Arg::Uint(version),
                Arg::NewId(id),
            ],
        )?;
        debug!("bound {} v{} as object {}", interface.name, version, id);
        Ok(id)
    }

    /// Find an advertised global by interface name.
    pub fn find_global(&self, interface: &str) -> Option<GlobalInfo> {
        self.globals.iter().find(|g| g.interface == interface).cloned()
    }

    /// Bind a required global or fail naming the missing interface.
    pub fn bind_required(&mut self, interface: &'static Interface) -> Result<u32, FatalError> {
        let global = self
            .find_global(interface.name)
            .ok_or(FatalError::MissingGlobal(interface.name))?;
        self.bind_global(&global, interface)
    }

    /// Destructor requests remove the local entry immediately; the later
    /// `delete_id` from the server is what frees the id for reuse.
    pub fn send_destructor(&mut self, object_id: u32, opcode: u16) -> Result<(), FatalError> {
        self.send_request(object_id, opcode, vec![])?;
        self.unregister(object_id);
        Ok(())
    }
}

/// Connect, perform the registry handshake and return the connection with
/// its global list populated.
pub fn bootstrap() -> Result<Connection, FatalError> {
    let mut conn = Connection::connect()?;
    let mut pending = VecDeque::new();
    conn.get_registry()?;
    let callback = conn.sync()?;
    conn.roundtrip(callback, &mut pending)?;
    info!("registry advertised {} globals", conn.globals.len());
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::interfaces::wl_registry;

    fn pair() -> (Connection, UnixStream) {
        let (client, server) = UnixStream::pair().unwrap();
        server.set_nonblocking(false).unwrap();
        (Connection::from_stream(client).unwrap(), server)
    }

    fn server_send(server: &mut UnixStream, msg: Message) {
        use std::io::Write;
        let (bytes, _fds) = wire::encode(msg).unwrap();
        server.write_all(&bytes).unwrap();
    }

    #[test]
    fn ids_allocate_from_two_and_increase() {
        let (mut conn, _server) = pair();
        assert_eq!(conn.allocate_id(), 2);
        assert_eq!(conn.allocate_id(), 3);
        assert_eq!(conn.allocate_id(), 4);
    }

    #[test]
    fn freed_ids_are_reused_only_after_delete_id() {
        let (mut conn, mut server) = pair();
        let a = conn.new_object(&interfaces::WL_CALLBACK);
        let b = conn.allocate_id();
        assert_eq!((a, b), (2, 3));

        // Destroying locally does not recycle the id.
        conn.unregister(a);
        assert_eq!(conn.allocate_id(), 4);

        // delete_id from the server does.
        server_send(
            &mut server,
            Message::new(DISPLAY_ID, 1, vec![Arg::Uint(a)]),
        );
        let mut out = VecDeque::new();
        assert!(conn.run_once(100, &mut out).unwrap());
        assert_eq!(conn.allocate_id(), a);
    }

    #[test]
    fn registry_globals_are_collected() {
        let (mut conn, mut server) = pair();
        let registry = conn.get_registry().unwrap();
        let callback = conn.sync().unwrap();
        conn.flush().unwrap();

        for (name, interface, version) in [
            (1u32, "wl_compositor", 5u32),
            (2, "wl_shm", 1),
            (3, "wl_seat", 8),
            (4, "river_window_manager_v1", 1),
        ] {
            server_send(
                &mut server,
                Message::new(
                    registry,
                    wl_registry::EVT_GLOBAL,
                    vec![
                        Arg::Uint(name),
                        Arg::Str(Some(interface.into())),
                        Arg::Uint(version),
                    ],
                ),
            );
        }
        // callback done ends the roundtrip
        server_send(&mut server, Message::new(callback, 0, vec![Arg::Uint(0)]));

        let mut out = VecDeque::new();
        conn.roundtrip(callback, &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(conn.globals.len(), 4);
        assert!(conn.find_global("river_window_manager_v1").is_some());

        // Version negotiation takes the server minimum into account.
        let global = conn.find_global("river_window_manager_v1").unwrap();
        assert_eq!(global.version.min(interfaces::RIVER_WINDOW_MANAGER.version), 1);
    }

    #[test]
    fn missing_required_global_names_the_interface() {
        let (mut conn, _server) = pair();
        let err = conn.bind_required(&interfaces::RIVER_WINDOW_MANAGER).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        match err {
            FatalError::MissingGlobal(name) => assert_eq!(name, "river_window_manager_v1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn display_error_is_fatal_with_server_detail() {
        let (mut conn, mut server) = pair();
        server_send(
            &mut server,
            Message::new(
                DISPLAY_ID,
                0,
                vec![Arg::Object(7), Arg::Uint(2), Arg::Str(Some("bad request".into()))],
            ),
        );
        let mut out = VecDeque::new();
        let err = conn.run_once(100, &mut out).unwrap_err();
        match err {
            FatalError::Server { object_id, code, message } => {
                assert_eq!((object_id, code), (7, 2));
                assert_eq!(message, "bad request");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_object_events_are_ignored() {
        let (mut conn, mut server) = pair();
        server_send(&mut server, Message::new(99, 0, vec![]));
        let mut out = VecDeque::new();
        assert!(conn.run_once(100, &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn clean_close_returns_false() {
        let (mut conn, server) = pair();
        drop(server);
        let mut out = VecDeque::new();
        assert!(!conn.run_once(100, &mut out).unwrap());
    }
}
