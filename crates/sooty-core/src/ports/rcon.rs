//! Remote console port.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::RconEndpoint;

#[derive(Debug, Error)]
pub enum RconError {
    #[error("RCON authentication rejected by {address}")]
    Auth { address: String },

    #[error("RCON exchange with {address} timed out after {}ms", .after.as_millis())]
    Timeout { address: String, after: Duration },

    #[error("RCON connection to {address} failed: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Malformed RCON packet from {address}: {reason}")]
    Protocol { address: String, reason: String },
}

/// Connected player count parsed from a console reply.
///
/// Fields are `None` when the reply format was not recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerCount {
    pub online: Option<u32>,
    pub max: Option<u32>,
}

impl PlayerCount {
    pub const fn unknown() -> Self {
        Self {
            online: None,
            max: None,
        }
    }

    pub const fn is_known(&self) -> bool {
        self.online.is_some()
    }
}

/// Sends one console command per connection.
#[async_trait]
pub trait RconClient: Send + Sync {
    /// Connect, authenticate, send `command`, and return the reply body.
    ///
    /// The whole exchange is bounded by `timeout`.
    async fn execute(
        &self,
        endpoint: &RconEndpoint,
        command: &str,
        timeout: Duration,
    ) -> Result<String, RconError>;
}
