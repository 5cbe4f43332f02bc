use std::io::Read;
use std::thread::{self, JoinHandle};

use tracing::trace;

use crate::pty::OutputHandler;

/// Spawns a background thread that drains a PTY into `handler` until EOF.
///
/// Keeping the PTY drained stops the program (and the recorder watching it)
/// from blocking on a full output buffer.
pub fn spawn_reader<R: Read + Send + 'static>(
    mut reader: R,
    handler: OutputHandler,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break, // EOF
                Ok(n) => handler(&buffer[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // EIO is how Linux reports a hung-up PTY
                    trace!(error = %e, "PTY reader stopped");
                    break;
                }
            }
        }
    })
}
