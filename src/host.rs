//! Browser bridge: reads `HostMessage` JSON lines from stdin.

use crate::session::HostMessage;
use std::io::{BufRead, ErrorKind};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

/// Forward parsed messages from `reader` until EOF, a read error, or until the
/// receiver is gone. Undecodable and malformed lines are skipped.
/// Returns the number of messages forwarded.
pub fn forward_messages<R: BufRead>(mut reader: R, tx: &Sender<HostMessage>) -> usize {
    let mut forwarded = 0;
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => line_no += 1,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Host input read failed after line {}: {}", line_no, e);
                break;
            }
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Skipping undecodable host line {}: {}", line_no, e);
                continue;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<HostMessage>(trimmed) {
            Ok(message) => {
                if tx.send(message).is_err() {
                    break;
                }
                forwarded += 1;
            }
            Err(e) => tracing::warn!("Skipping malformed host line {}: {}", line_no, e),
        }
    }

    forwarded
}

/// Spawn the stdin reader thread
pub fn spawn_stdin_reader(tx: Sender<HostMessage>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("host-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            let count = forward_messages(stdin.lock(), &tx);
            tracing::info!("Host input closed after {} messages", count);
        })
}
