//! Post-processing filters over a recorded [`EventStream`].
//!
//! Each filter is a pure transform from one stream to the next. A
//! [`FilterPipeline`] applies them in order and stops at the first failure,
//! so a failed pipeline never yields a partially filtered stream.
//!
//! ## Trimming order
//!
//! [`StartMarkerFilter`] and [`EndMarkerFilter`] are not applied as two
//! independent steps. When the pipeline reaches the first trim filter it
//! locates both markers in the stream as it stands at that point and cuts the
//! window in one go. List order between the two therefore never matters, and
//! an end trim can never remove the start marker before it is found.

mod comment;
mod replace;
mod trim;

pub use comment::CommentFilter;
pub use replace::RegexReplacementFilter;
pub use trim::{EndMarkerFilter, StartMarkerFilter};

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cast::EventStream;
use crate::error::{ConfigError, FilterError, FilterFailure};
use trim::{Bound, TrimWindow};

/// Identifies a filter in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    StartMarker,
    EndMarker,
    Comment,
    RegexReplacement,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartMarker => "StartMarkerFilter",
            Self::EndMarker => "EndMarkerFilter",
            Self::Comment => "CommentFilter",
            Self::RegexReplacement => "RegexReplacementFilter",
        };
        f.write_str(name)
    }
}

/// A single configured filter.
#[derive(Debug, Clone)]
pub enum Filter {
    StartMarker(StartMarkerFilter),
    EndMarker(EndMarkerFilter),
    Comment(CommentFilter),
    RegexReplacement(RegexReplacementFilter),
}

impl Filter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::StartMarker(_) => FilterKind::StartMarker,
            Self::EndMarker(_) => FilterKind::EndMarker,
            Self::Comment(_) => FilterKind::Comment,
            Self::RegexReplacement(_) => FilterKind::RegexReplacement,
        }
    }

    /// Apply this filter on its own.
    pub fn apply(&self, stream: EventStream) -> Result<EventStream, FilterFailure> {
        match self {
            Self::StartMarker(f) => f.apply(stream),
            Self::EndMarker(f) => f.apply(stream),
            Self::Comment(f) => Ok(f.apply(stream)),
            Self::RegexReplacement(f) => f.apply(stream),
        }
    }
}

/// Script-file representation of a filter, tagged by `filter_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "filter_id")]
pub enum FilterSpec {
    #[serde(rename = "StartMarkerFilter")]
    StartMarker { start_label: String },
    #[serde(rename = "EndMarkerFilter")]
    EndMarker { end_label: String },
    #[serde(rename = "CommentFilter")]
    Comment,
    #[serde(rename = "RegexReplacementFilter")]
    RegexReplacement { regex: String, replacement: String },
}

impl FilterSpec {
    pub fn kind(&self) -> FilterKind {
        match self {
            Self::StartMarker { .. } => FilterKind::StartMarker,
            Self::EndMarker { .. } => FilterKind::EndMarker,
            Self::Comment => FilterKind::Comment,
            Self::RegexReplacement { .. } => FilterKind::RegexReplacement,
        }
    }

    /// Build the filter, compiling any pattern.
    pub fn build(&self) -> Result<Filter, ConfigError> {
        Ok(match self {
            Self::StartMarker { start_label } => {
                Filter::StartMarker(StartMarkerFilter::new(start_label.clone()))
            }
            Self::EndMarker { end_label } => {
                Filter::EndMarker(EndMarkerFilter::new(end_label.clone()))
            }
            Self::Comment => Filter::Comment(CommentFilter),
            Self::RegexReplacement { regex, replacement } => Filter::RegexReplacement(
                RegexReplacementFilter::new(regex, replacement.clone())?,
            ),
        })
    }
}

/// An ordered list of filters.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    filters: Vec<Filter>,
}

impl FilterPipeline {
    /// Build a pipeline. At most one start and one end trim may be listed.
    pub fn new(filters: Vec<Filter>) -> Result<Self, ConfigError> {
        for kind in [FilterKind::StartMarker, FilterKind::EndMarker] {
            if filters.iter().filter(|f| f.kind() == kind).count() > 1 {
                return Err(ConfigError::DuplicateTrim(kind));
            }
        }
        Ok(Self { filters })
    }

    pub fn from_specs(specs: &[FilterSpec]) -> Result<Self, ConfigError> {
        Self::new(specs.iter().map(FilterSpec::build).collect::<Result<_, _>>()?)
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter in order, stopping at the first failure.
    pub fn apply(&self, mut stream: EventStream) -> Result<EventStream, FilterError> {
        let window = self.trim_window();
        let mut trimmed = false;

        for (index, filter) in self.filters.iter().enumerate() {
            let before = stream.len();
            stream = match filter {
                Filter::StartMarker(_) | Filter::EndMarker(_) => {
                    if trimmed {
                        continue;
                    }
                    trimmed = true;
                    window.cut(stream).map_err(|(bound, source)| {
                        let (index, kind) = match bound {
                            Bound::Start => (window.start_index, FilterKind::StartMarker),
                            Bound::End => (window.end_index, FilterKind::EndMarker),
                        };
                        FilterError {
                            index: index.unwrap_or_default(),
                            kind,
                            source,
                        }
                    })?
                }
                other => other.apply(stream).map_err(|source| FilterError {
                    index,
                    kind: other.kind(),
                    source,
                })?,
            };
            debug!(
                index,
                filter = %filter.kind(),
                before,
                after = stream.len(),
                "applied filter"
            );
        }

        Ok(stream)
    }

    fn trim_window(&self) -> TrimWindow<'_> {
        let mut window = TrimWindow::default();
        for (index, filter) in self.filters.iter().enumerate() {
            match filter {
                Filter::StartMarker(f) => {
                    window.start = Some(&f.start_label);
                    window.start_index = Some(index);
                }
                Filter::EndMarker(f) => {
                    window.end = Some(&f.end_label);
                    window.end_index = Some(index);
                }
                _ => {}
            }
        }
        window
    }
}
