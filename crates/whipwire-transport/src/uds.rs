use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stats::{TransportStats, MAX_DATAGRAM};

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Non-blocking Unix datagram receiver bound to a filesystem path.
///
/// A stale socket file at the path is replaced; any other kind of file is
/// left alone and binding fails. The socket file is removed on drop if it is
/// still the one this receiver created.
pub struct UnixDatagramReceiver {
    socket: UnixDatagram,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    recv_buffer: Box<[u8; MAX_DATAGRAM + 1]>,
    stats: TransportStats,
}

impl UnixDatagramReceiver {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind to `path` with the default mode.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind to `path` and set the socket file's permission bits to `mode`.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        check_path_len(&path)?;

        let bind_err = |source| TransportError::Bind {
            endpoint: format!("unix://{}", path.display()),
            source,
        };

        // Remove stale socket if it exists, but never remove non-socket files.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            } else {
                return Err(bind_err(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let socket = UnixDatagram::bind(&path).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix datagram socket");

        Ok(Self {
            socket,
            created_inode: Some((created.dev(), created.ino())),
            path,
            recv_buffer: Box::new([0u8; MAX_DATAGRAM + 1]),
            stats: TransportStats::default(),
        })
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Receive one datagram if one is pending.
    pub fn try_recv(&mut self) -> Result<Option<&[u8]>> {
        loop {
            match self.socket.recv(&mut self.recv_buffer[..]) {
                Ok(len) if len > MAX_DATAGRAM => {
                    self.stats.oversized += 1;
                    debug!(path = ?self.path, "dropping oversized datagram");
                }
                Ok(len) => {
                    self.stats.record_recv(len);
                    return Ok(Some(&self.recv_buffer[..len]));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.stats.recv_errors += 1;
                    return Err(e.into());
                }
            }
        }
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

impl Drop for UnixDatagramReceiver {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "cleaning up socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping cleanup"
                    );
                }
            }
        }
    }
}

/// Fire-and-forget Unix datagram sender.
pub struct UnixDatagramSender {
    socket: UnixDatagram,
    peer: PathBuf,
    stats: TransportStats,
}

impl UnixDatagramSender {
    /// Open an unbound datagram socket addressed at `peer`.
    ///
    /// The peer does not have to exist yet; sends fail until it does.
    pub fn connect(peer: impl AsRef<Path>) -> Result<Self> {
        let peer = peer.as_ref().to_path_buf();
        check_path_len(&peer)?;
        let socket = UnixDatagram::unbound().map_err(|source| TransportError::Connect {
            endpoint: format!("unix://{}", peer.display()),
            source,
        })?;
        debug!(?peer, "unix datagram sender ready");
        Ok(Self {
            socket,
            peer,
            stats: TransportStats::default(),
        })
    }

    /// Send one datagram. Nothing is retried.
    pub fn send(&mut self, datagram: &[u8]) -> Result<()> {
        let result = self.socket.send_to(datagram, &self.peer);
        self.stats.record_send(&result);
        result?;
        Ok(())
    }

    pub fn peer(&self) -> &Path {
        &self.peer
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}
