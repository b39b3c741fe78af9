//! Source RCON client.
//!
//! Each call opens a fresh TCP connection, authenticates, sends one command,
//! reads one reply and closes. The whole exchange shares one deadline.

mod packet;
mod status;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use sooty_core::ports::{PlayerCount, RconClient, RconError};
use sooty_core::{GameKind, RconEndpoint};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

pub use packet::{
    AUTH_FAILED_ID, MAX_PACKET_LEN, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE,
    SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};
pub use status::parse_player_count;

const AUTH_ID: i32 = 1;
const COMMAND_ID: i32 = 2;

/// Packets tolerated before the expected reply arrives.
const MAX_SKIPPED_PACKETS: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpRconClient;

impl TcpRconClient {
    pub const fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
enum ExchangeError {
    Connect(io::Error),
    Io(io::Error),
    AuthRejected,
    Protocol(String),
}

async fn exchange(endpoint: &RconEndpoint, command: &str) -> Result<String, ExchangeError> {
    let mut stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(ExchangeError::Connect)?;

    Packet::new(AUTH_ID, SERVERDATA_AUTH, endpoint.password.as_str())
        .write_to(&mut stream)
        .await
        .map_err(ExchangeError::Io)?;

    // Source servers send an empty RESPONSE_VALUE ahead of the auth answer.
    let mut authenticated = false;
    for _ in 0..MAX_SKIPPED_PACKETS {
        let reply = Packet::read_from(&mut stream)
            .await
            .map_err(ExchangeError::Io)?;
        if reply.id == AUTH_FAILED_ID {
            return Err(ExchangeError::AuthRejected);
        }
        if reply.kind == SERVERDATA_AUTH_RESPONSE {
            if reply.id != AUTH_ID {
                return Err(ExchangeError::Protocol(format!(
                    "auth response carried id {}",
                    reply.id
                )));
            }
            authenticated = true;
            break;
        }
    }
    if !authenticated {
        return Err(ExchangeError::Protocol("no auth response".to_owned()));
    }

    Packet::new(COMMAND_ID, SERVERDATA_EXECCOMMAND, command)
        .write_to(&mut stream)
        .await
        .map_err(ExchangeError::Io)?;

    for _ in 0..MAX_SKIPPED_PACKETS {
        let reply = Packet::read_from(&mut stream)
            .await
            .map_err(ExchangeError::Io)?;
        if reply.id == COMMAND_ID && reply.kind == SERVERDATA_RESPONSE_VALUE {
            return Ok(reply.body);
        }
        debug!(id = reply.id, kind = reply.kind, "skipping unexpected RCON packet");
    }
    Err(ExchangeError::Protocol("no command response".to_owned()))
}

#[async_trait]
impl RconClient for TcpRconClient {
    #[instrument(skip(self, endpoint), fields(address = %endpoint.address()))]
    async fn execute(
        &self,
        endpoint: &RconEndpoint,
        command: &str,
        timeout: Duration,
    ) -> Result<String, RconError> {
        let address = endpoint.address();
        match tokio::time::timeout(timeout, exchange(endpoint, command)).await {
            Err(_) => Err(RconError::Timeout {
                address,
                after: timeout,
            }),
            Ok(Ok(body)) => {
                debug!(bytes = body.len(), "RCON reply received");
                Ok(body)
            }
            Ok(Err(ExchangeError::AuthRejected)) => Err(RconError::Auth { address }),
            Ok(Err(ExchangeError::Connect(source))) => {
                Err(RconError::Connection { address, source })
            }
            Ok(Err(ExchangeError::Io(source))) if source.kind() == io::ErrorKind::InvalidData => {
                Err(RconError::Protocol {
                    address,
                    reason: source.to_string(),
                })
            }
            Ok(Err(ExchangeError::Io(source))) => Err(RconError::Connection { address, source }),
            Ok(Err(ExchangeError::Protocol(reason))) => Err(RconError::Protocol { address, reason }),
        }
    }
}

/// Query the player count with the game's status command.
///
/// Transport failures are errors; an unrecognised reply is
/// [`PlayerCount::unknown`].
pub async fn query_player_count(
    client: &dyn RconClient,
    endpoint: &RconEndpoint,
    game: GameKind,
    timeout: Duration,
) -> Result<PlayerCount, RconError> {
    let reply = client
        .execute(endpoint, game.player_query_command(), timeout)
        .await?;
    Ok(parse_player_count(&reply))
}
