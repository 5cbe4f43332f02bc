use std::io::{self, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, warn};

use crate::engine::Terminal;
use crate::error::SessionError;
use crate::pty_reader::spawn_reader;

/// Receives everything the program writes to the terminal.
pub type OutputHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// How long `close` waits for the program to exit on its own.
const EXIT_GRACE: Duration = Duration::from_secs(3);
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Manages a program running inside a PTY
pub struct PtySession {
    master: Option<Box<dyn MasterPty + Send>>,
    child: Box<dyn Child + Send + Sync>,
    writer: Option<Box<dyn Write + Send>>,
    reader: Option<JoinHandle<()>>,
}

impl PtySession {
    /// Spawn `argv` in a PTY of the given size. Output is drained on a
    /// background thread into `handler`.
    pub fn spawn(
        argv: &[String],
        cols: u16,
        rows: u16,
        handler: OutputHandler,
    ) -> Result<Self, SessionError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SessionError::Spawn("empty command line".to_string()))?;
        let spawn_err =
            |what: &str, e: &dyn std::fmt::Display| SessionError::Spawn(format!("{what}: {e}"));

        let pty_system = portable_pty::native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_err("failed to open PTY", &e))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_err(&format!("failed to spawn '{program}'"), &e))?;
        // The reader only sees EOF once every slave handle is gone.
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_err("failed to get PTY writer", &e))?;
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err("failed to get PTY reader", &e))?;

        debug!(
            program = %program,
            cols,
            rows,
            pid = ?child.process_id(),
            "spawned terminal program"
        );
        Ok(Self {
            master: Some(pair.master),
            child,
            writer: Some(writer),
            reader: Some(spawn_reader(reader, handler)),
        })
    }

    /// Resize the PTY
    pub fn resize(&self, cols: u16, rows: u16) -> io::Result<()> {
        let Some(master) = &self.master else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "terminal is closed"));
        };
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(io::Error::other)
    }

    async fn wait_for_exit(&mut self) -> io::Result<bool> {
        let deadline = tokio::time::Instant::now() + EXIT_GRACE;
        loop {
            if let Some(status) = self.child.try_wait()? {
                debug!(success = status.success(), "terminal program exited");
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(EXIT_POLL).await;
        }
    }
}

#[async_trait(?Send)]
impl Terminal for PtySession {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "terminal is closed"));
        };
        writer.write_all(data)?;
        writer.flush()
    }

    fn is_alive(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Drop our end of the PTY (the writer delivers EOF on drop), give the
    /// program a grace period to exit, then kill it.
    async fn close(&mut self) -> io::Result<()> {
        self.writer.take();
        self.master.take();

        if !self.wait_for_exit().await? {
            warn!("terminal program did not exit, killing it");
            self.child.kill()?;
            self.child.wait()?;
        }

        if let Some(reader) = self.reader.take() {
            let joined = tokio::task::spawn_blocking(move || reader.join());
            if tokio::time::timeout(EXIT_GRACE, joined).await.is_err() {
                warn!("PTY reader did not finish, detaching it");
            }
        }
        Ok(())
    }
}
