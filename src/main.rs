//! rift
//!
//! A tiling window manager for the River Wayland compositor. Speaks the
//! wire protocol directly over the compositor socket and drives window
//! management through the river-window-management-v1 extension.

mod config;
mod connection;
mod decoration;
mod error;
mod ipc;
mod layout;
mod protocol;
mod shm;
mod spawn;
mod wm;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::error::FatalError;

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_signal(_: libc::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

fn install_signal_handlers() {
    unsafe {
        for sig in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
            libc::signal(sig, handle_signal as libc::sighandler_t);
        }
        // Spawned children are reaped by the kernel.
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }
}

fn fatal(err: FatalError) -> ! {
    error!("fatal: {err}");
    std::process::exit(err.exit_code());
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rift=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.apply_args(std::env::args().skip(1)) {
        error!("{e:#}");
        std::process::exit(1);
    }

    install_signal_handlers();

    let conn = match connection::bootstrap() {
        Ok(conn) => conn,
        Err(e) => fatal(e),
    };
    let mut manager = match wm::Wm::new(conn, config) {
        Ok(manager) => manager,
        Err(e) => fatal(e),
    };
    info!("managing windows");

    let mut ipc = match ipc::IpcServer::start() {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("ipc disabled: {e:#}");
            None
        }
    };

    while manager.running() {
        if !RUNNING.load(Ordering::SeqCst) {
            manager.quit();
            break;
        }
        match manager.run_once(100) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("fatal: {e:#}");
                break;
            }
        }
        if let Some(server) = ipc.as_mut() {
            for action in server.poll(&manager) {
                if let Err(e) = manager.apply_action(action, None) {
                    error!("fatal: {e:#}");
                    break;
                }
            }
            for event in manager.drain_ipc_events() {
                server.broadcast(&event);
            }
        }
    }

    if let Some(server) = ipc.as_mut() {
        server.shutdown();
    }
    info!("exiting with code {}", manager.exit_code());
    std::process::exit(manager.exit_code());
}
