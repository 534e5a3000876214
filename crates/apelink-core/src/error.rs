use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Memory access failed at address {address:#x}: {message}")]
    MemoryAccessFailed { address: u32, message: String },

    #[error("Not attached to a running game")]
    NotInGame,

    #[error("Address key unavailable for this version: {0}")]
    KeyUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error came from the memory transport.
    ///
    /// Transport errors demote the connection and are retried on the
    /// next tick; everything else is handled where it occurs.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::MemoryAccessFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_classification() {
        assert!(Error::Transport("link down".into()).is_transport());
        assert!(
            Error::MemoryAccessFailed {
                address: 0x1000,
                message: "short read".into()
            }
            .is_transport()
        );
        assert!(!Error::NotInGame.is_transport());
        assert!(!Error::KeyUnavailable("morphGauge".into()).is_transport());
        assert!(!Error::Persistence("read-only directory".into()).is_transport());
    }
}
