//! Player directory contract consumed by the control core.
//!
//! The media server owns the player list and every player's volume; the core
//! only talks to it through this trait, which keeps the gesture logic
//! testable against a fake server.

use async_trait::async_trait;
use thiserror::Error;

/// A controllable player as listed by the media server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Server-side player identifier (a MAC address for LMS).
    pub id: String,
    /// Display name, unique within one listing.
    pub name: String,
}

/// Failures from the remote directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server could not be reached or rejected the request.
    #[error("cannot list players: {source}")]
    Unavailable {
        #[source]
        source: anyhow::Error,
    },

    /// A single player did not respond to an operation.
    #[error("player '{player}' is unresponsive: {source}")]
    PlayerUnresponsive {
        player: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Remote player operations.
///
/// Every operation can fail independently. The control core treats all of
/// them as completed-but-ineffective: failures are logged at the gesture
/// boundary and never retried.
#[async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// Fetch the current ordered player list. The snapshot goes stale
    /// immediately; callers re-fetch instead of caching it.
    async fn list_players(&self) -> Result<Vec<Player>, DirectoryError>;

    /// Current volume of `player`, in [0, 100].
    async fn volume(&self, player: &Player) -> Result<i32, DirectoryError>;

    async fn set_volume(&self, player: &Player, volume: i32) -> Result<(), DirectoryError>;

    async fn toggle_play_pause(&self, player: &Player) -> Result<(), DirectoryError>;

    async fn next_track(&self, player: &Player) -> Result<(), DirectoryError>;

    async fn previous_track(&self, player: &Player) -> Result<(), DirectoryError>;
}
