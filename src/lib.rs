//! # scriptcast
//!
//! Scripted, human-paced terminal recordings with asciinema.
//!
//! A script lists lines to type, markers to drop and comments to overlay.
//! scriptcast runs `asciinema rec` inside a pseudo-terminal, types each line
//! with randomized per-character delays, stamps markers and comments at the
//! right session time, and post-processes the recording with a filter
//! pipeline (trim to markers, render comments, redact text).
//!
//! ## Quick start
//!
//! ```no_run
//! use scriptcast::{Action, Script, runner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let script = Script::new("demo.cast").with_actions([
//!         Action::marker("Listing"),
//!         Action::input("ls -la"),
//!         Action::input("exit"),
//!     ]);
//!     let session = runner::record(&script, None).await?;
//!     println!("{} events recorded", session.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Script files
//!
//! Scripts load from JSON, TOML or YAML with [`Script::load`]:
//!
//! ```yaml
//! output_file: demo.cast
//! typing_delay: [0.05, 0.1]
//! with_comments: true
//! actions:
//!   - action_id: Comment
//!     comment: See what files are here
//!   - ls
//!   - action_id: Marker
//!     label: END
//!   - exit
//! filters:
//!   - filter_id: EndMarkerFilter
//!     end_label: END
//!   - filter_id: RegexReplacementFilter
//!     regex: /home/\w+
//!     replacement: "~"
//! ```
//!
//! ## Filtering an existing recording
//!
//! Filters work on any asciicast v2 log:
//!
//! ```no_run
//! use scriptcast::{EventStream, FilterSpec, FilterPipeline};
//!
//! # fn main() -> scriptcast::Result<()> {
//! let pipeline = FilterPipeline::from_specs(&[FilterSpec::RegexReplacement {
//!     regex: "s3cr3t".to_string(),
//!     replacement: "******".to_string(),
//! }])?;
//! let session = EventStream::load("demo.cast")?;
//! pipeline.apply(session)?.save_atomic("demo.redacted.cast")?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod cast;
pub mod config;
pub mod delay;
pub mod engine;
pub mod error;
pub mod filter;
pub mod markers;
pub mod pty;
pub(crate) mod pty_reader;
pub mod recorder;
pub mod runner;

pub use action::{Action, InputLine};
pub use cast::{CommentOverlay, Event, EventKind, EventStream, Header, OverlayPosition};
pub use config::{DelayRange, Script, ScriptFormat, SessionConfig};
pub use delay::DelayModel;
pub use engine::{Terminal, Typist};
pub use error::{Error, Result};
pub use filter::{Filter, FilterKind, FilterPipeline, FilterSpec};
pub use recorder::{AsciinemaRecorder, Recorder, Stamp, StampKind};
