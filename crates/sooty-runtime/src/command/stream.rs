//! Async stream line readers (non-UTF8-safe).
//!
//! Game server tooling (steamcmd in particular) can emit non-UTF8 bytes and
//! carriage-return progress output. `BufReader::lines()` would terminate the
//! reader on invalid UTF-8, so lines are read as bytes and decoded lossily.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawn a task forwarding each line of `stream` into `tx`.
///
/// A final fragment without a trailing newline is forwarded when the stream
/// closes.
pub fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    program: String,
    stream_type: &'static str,
    tx: UnboundedSender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let line = decode_line(&mut buf);
                    debug!(%program, %stream_type, "{}", line);
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(%program, %stream_type, error = %e, "line reader exiting due to read error");
                    break;
                }
            }
        }
    })
}

/// Strip the line terminator and decode lossily.
fn decode_line(buf: &mut Vec<u8>) -> String {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8_lossy(buf).into_owned()
}
