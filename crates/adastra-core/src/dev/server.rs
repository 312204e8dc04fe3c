//! The asset dev server as seen by the refresh scheduler.

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::error::Result;

/// A long-running listener serving frontend assets to the theme.
///
/// The scheduler owns the server exclusively and drives it from a single
/// task, so implementations need no internal locking.
#[async_trait]
pub trait AssetServer: Send + 'static {
    /// Bind and start serving. Called once.
    async fn listen(&mut self) -> Result<SocketAddr>;

    /// Restart serving on the already-bound socket.
    ///
    /// Failures are [`crate::Error::ListenerRestart`] and are not retried.
    async fn restart(&mut self) -> Result<()>;

    /// Stop serving and release the socket. Safe to call when not listening.
    async fn close(&mut self) -> Result<()>;
}
