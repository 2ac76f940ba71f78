//! Error Taxonomy
//!
//! Fatal error categories and their process exit codes. Non-fatal
//! conditions (events for unknown objects, actions on destroyed windows)
//! are logged and dropped at the dispatch site and never reach this type.

use thiserror::Error;

use crate::protocol::wire::FrameError;

/// Exit code for a normal, user-requested quit.
pub const EXIT_OK: i32 = 0;

/// Errors that terminate the window manager.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("failed to connect to the compositor socket: {0}")]
    Connect(String),

    #[error("transport error on the compositor socket")]
    Transport(#[from] std::io::Error),

    #[error("protocol error on object {object_id}, opcode {opcode}: {source}")]
    Protocol {
        object_id: u32,
        opcode: u16,
        #[source]
        source: FrameError,
    },

    #[error("compositor reported error {code} on object {object_id}: {message}")]
    Server {
        object_id: u32,
        code: u32,
        message: String,
    },

    #[error("required interface {0} is not advertised by the compositor")]
    MissingGlobal(&'static str),

    #[error("window management is unavailable (is another manager running?)")]
    Unavailable,
}

impl FatalError {
    /// Map the error category to the documented process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::Connect(_) | FatalError::Transport(_) => 2,
            FatalError::Protocol { .. } => 3,
            FatalError::Server { .. }
            | FatalError::MissingGlobal(_)
            | FatalError::Unavailable => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_taxonomy() {
        assert_eq!(FatalError::Connect("x".into()).exit_code(), 2);
        assert_eq!(
            FatalError::Protocol {
                object_id: 1,
                opcode: 0,
                source: FrameError::Unaligned(13)
            }
            .exit_code(),
            3
        );
        assert_eq!(FatalError::MissingGlobal("river_window_manager_v1").exit_code(), 1);
        assert_eq!(
            FatalError::Server { object_id: 1, code: 0, message: String::new() }.exit_code(),
            1
        );
    }
}
