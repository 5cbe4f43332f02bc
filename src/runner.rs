//! End-to-end recording: spawn asciinema in a PTY, type the script, merge
//! stamps, run the filter pipeline and write the result.

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use crate::cast::{EventStream, OverlayPosition};
use crate::config::Script;
use crate::engine::Typist;
use crate::error::{CastError, Result, SessionError};
use crate::filter::CommentFilter;
use crate::pty::{OutputHandler, PtySession};
use crate::recorder::AsciinemaRecorder;

/// Record `script` and write the filtered session to its output file.
///
/// Terminal output is passed to `echo` when given. On Ctrl-C or a session
/// failure the terminal is shut down and the error returned. Whatever
/// asciinema captured stays in the raw log, and the same log with markers
/// and rendered comments is saved to [`Script::partial_output_path`]. Filter
/// failures leave the output file untouched.
pub async fn record(script: &Script, echo: Option<OutputHandler>) -> Result<EventStream> {
    let config = script.session_config()?;
    let pipeline = script.pipeline()?;
    let raw_path = script.raw_output_path();
    ensure_parent(&raw_path)?;
    ensure_parent(&script.output_file)?;

    let status_line = config
        .with_comments
        .then(|| OverlayPosition::from_top(config.comments_at_top));
    let recorder = AsciinemaRecorder::new(&raw_path, config.cols, config.rows, status_line)?;
    let handler: OutputHandler = match echo {
        Some(handler) => handler,
        None => Arc::new(|_: &[u8]| {}),
    };
    let terminal = PtySession::spawn(&recorder.command(), config.cols, config.rows, handler)?;
    info!(raw = %raw_path.display(), "recording started");

    let mut typist = Typist::new(config, terminal, recorder, script.delay_model());
    let outcome = tokio::select! {
        result = typist.run(&script.actions) => Some(result),
        _ = signal::ctrl_c() => None,
    };
    let outcome = outcome.unwrap_or_else(|| {
        Err(SessionError::Aborted {
            completed: typist.completed(),
        })
    });

    if let Err(err) = outcome {
        if let Err(close_err) = typist.abort().await {
            warn!(error = %close_err, "failed to close terminal");
        }
        match typist.finish().await {
            Ok(partial) => {
                let path = script.partial_output_path();
                if let Err(save_err) = save_partial(partial, &path) {
                    warn!(error = %save_err, "failed to save partial recording");
                }
            }
            Err(stop_err) => warn!(error = %stop_err, "no partial recording available"),
        }
        return Err(err.into());
    }

    let recorded = typist.finish().await?;
    let filtered = pipeline.apply(recorded)?;
    filtered.save_atomic(&script.output_file)?;
    info!(
        output = %script.output_file.display(),
        events = filtered.len(),
        markers = filtered.markers().count(),
        "recording written"
    );
    Ok(filtered)
}

/// Save an unfiltered session with its comments rendered, since comment
/// events cannot be written as asciicast.
fn save_partial(stream: EventStream, path: &Path) -> Result<(), CastError> {
    let stream = CommentFilter.apply(stream);
    stream.save_atomic(path)?;
    info!(
        path = %path.display(),
        events = stream.len(),
        markers = stream.markers().count(),
        "partial recording saved"
    );
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), CastError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir).map_err(|source| CastError::Write {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
