use std::path::{Path, PathBuf};

/// IPC endpoint addresses of one producer/subscriber pairing.
///
/// Both addresses derive deterministically from the producer's process
/// id, so independent sessions on the same machine never collide and the
/// two processes need no renegotiation.
#[derive(Debug, Clone)]
pub struct SessionEndpoints {
    main: String,
    handshake: String,
    main_path: PathBuf,
    handshake_path: PathBuf,
}

impl SessionEndpoints {
    /// Derives the endpoint addresses for the given producer process id.
    pub fn from_producer_id(id: u32) -> Self {
        let dir = runtime_dir();

        let main_path = dir.join(format!("keyhole-{id}.ipc"));
        let handshake_path = dir.join(format!("keyhole-{id}-sync.ipc"));

        Self {
            main: format!("ipc://{}", main_path.display()),
            handshake: format!("ipc://{}", handshake_path.display()),
            main_path,
            handshake_path,
        }
    }

    /// Address of the main publish/subscribe channel.
    pub fn main(&self) -> &str {
        &self.main
    }

    /// Address of the handshake request/reply channel.
    pub fn handshake(&self) -> &str {
        &self.handshake
    }

    /// Filesystem path behind the main channel address.
    pub fn main_path(&self) -> &Path {
        &self.main_path
    }

    /// Filesystem path behind the handshake channel address.
    pub fn handshake_path(&self) -> &Path {
        &self.handshake_path
    }
}

/// Directory holding the per-session socket files.
///
/// `$XDG_RUNTIME_DIR` when set, `/tmp` otherwise.
fn runtime_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_distinct_per_producer() {
        let a = SessionEndpoints::from_producer_id(1);
        let b = SessionEndpoints::from_producer_id(2);

        assert_ne!(a.main(), b.main());
        assert_ne!(a.handshake(), b.handshake());
    }

    #[test]
    fn main_and_handshake_never_collide() {
        let endpoints = SessionEndpoints::from_producer_id(4242);

        assert_ne!(endpoints.main(), endpoints.handshake());
        assert!(endpoints.main().starts_with("ipc://"));
        assert!(endpoints.handshake().ends_with("-sync.ipc"));
    }
}
