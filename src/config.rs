//! Script files and session configuration.
//!
//! A [`Script`] is the full description of a recording: where to write it,
//! how fast to type, what to type, and how to post-process the result. It
//! loads from JSON, TOML or YAML and is validated eagerly, so a bad delay
//! range or regex is reported before any terminal is spawned.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::Action;
use crate::delay::DelayModel;
use crate::error::ConfigError;
use crate::filter::{FilterKind, FilterPipeline, FilterSpec};

/// A closed interval `[min, max]` that delays are sampled from.
///
/// In script files a range is written as `[min, max]` in seconds, or as a
/// single number for a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DelayRepr", into = "DelayRepr")]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidDelayRange {
                min: min.as_secs_f64(),
                max: max.as_secs_f64(),
                reason: "min is greater than max",
            });
        }
        Ok(Self { min, max })
    }

    /// Build a range from seconds, rejecting negative and non-finite values.
    pub fn from_secs(min: f64, max: f64) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidDelayRange { min, max, reason };
        let to_duration = |secs: f64| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| invalid("delays must be finite and non-negative"))
        };
        Self::new(to_duration(min)?, to_duration(max)?)
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn contains(&self, delay: Duration) -> bool {
        self.min <= delay && delay <= self.max
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DelayRepr {
    Fixed(f64),
    Range([f64; 2]),
}

impl TryFrom<DelayRepr> for DelayRange {
    type Error = ConfigError;

    fn try_from(repr: DelayRepr) -> Result<Self, Self::Error> {
        match repr {
            DelayRepr::Fixed(secs) => Self::from_secs(secs, secs),
            DelayRepr::Range([min, max]) => Self::from_secs(min, max),
        }
    }
}

impl From<DelayRange> for DelayRepr {
    fn from(range: DelayRange) -> Self {
        if range.min == range.max {
            Self::Fixed(range.min.as_secs_f64())
        } else {
            Self::Range([range.min.as_secs_f64(), range.max.as_secs_f64()])
        }
    }
}

/// Immutable settings for one scripted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub cols: u16,
    pub rows: u16,
    pub start_delay: Duration,
    pub end_delay: Duration,
    pub typing_delay: DelayRange,
    pub pre_nl_delay: DelayRange,
    pub post_nl_delay: DelayRange,
    pub with_comments: bool,
    pub comments_at_top: bool,
    /// Fraction of the previous post-newline pause that markers and comments
    /// are moved back by, so they land before the next line starts.
    pub marker_lead: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
            start_delay: Duration::from_millis(300),
            end_delay: Duration::from_millis(500),
            typing_delay: DelayRange {
                min: Duration::from_millis(50),
                max: Duration::from_millis(100),
            },
            pre_nl_delay: DelayRange::fixed(Duration::from_millis(200)),
            post_nl_delay: DelayRange {
                min: Duration::from_millis(800),
                max: Duration::from_millis(1000),
            },
            with_comments: false,
            comments_at_top: false,
            marker_lead: DEFAULT_MARKER_LEAD,
        }
    }
}

const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;
const DEFAULT_MARKER_LEAD: f64 = 0.8;

/// Script file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    Json,
    Toml,
    Yaml,
}

impl ScriptFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| ConfigError::UnknownFormat(path.display().to_string()))
    }
}

impl fmt::Display for ScriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
        })
    }
}

fn default_start_delay() -> f64 {
    0.3
}

fn default_end_delay() -> f64 {
    0.5
}

fn default_typing_delay() -> DelayRange {
    SessionConfig::default().typing_delay
}

fn default_pre_nl_delay() -> DelayRange {
    SessionConfig::default().pre_nl_delay
}

fn default_post_nl_delay() -> DelayRange {
    SessionConfig::default().post_nl_delay
}

fn default_marker_lead() -> f64 {
    DEFAULT_MARKER_LEAD
}

/// A complete recording script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Filtered recording. Relative paths resolve against the script file.
    pub output_file: PathBuf,
    /// Unfiltered recording; defaults to `<stem>.raw.cast` beside `output_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,
    #[serde(default = "default_start_delay")]
    pub start_delay: f64,
    #[serde(default = "default_end_delay")]
    pub end_delay: f64,
    #[serde(default = "default_typing_delay")]
    pub typing_delay: DelayRange,
    #[serde(default = "default_pre_nl_delay")]
    pub pre_nl_delay: DelayRange,
    #[serde(default = "default_post_nl_delay")]
    pub post_nl_delay: DelayRange,
    #[serde(default)]
    pub with_comments: bool,
    #[serde(default)]
    pub comments_at_top: bool,
    #[serde(default = "default_marker_lead")]
    pub marker_lead: f64,
    /// Fixed RNG seed for reproducible timing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

impl Script {
    /// A script with default timing and no actions.
    pub fn new(output_file: impl Into<PathBuf>) -> Self {
        Self {
            output_file: output_file.into(),
            raw_output_file: None,
            cols: None,
            rows: None,
            start_delay: default_start_delay(),
            end_delay: default_end_delay(),
            typing_delay: default_typing_delay(),
            pre_nl_delay: default_pre_nl_delay(),
            post_nl_delay: default_post_nl_delay(),
            with_comments: false,
            comments_at_top: false,
            marker_lead: default_marker_lead(),
            seed: None,
            actions: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = FilterSpec>) -> Self {
        self.filters = filters.into_iter().collect();
        self
    }

    /// Turn on comment overlays, adding a comment filter if none is listed.
    pub fn with_comments_enabled(mut self, at_top: bool) -> Self {
        self.with_comments = true;
        self.comments_at_top = at_top;
        self.ensure_comment_filter();
        self
    }

    fn ensure_comment_filter(&mut self) {
        if self.with_comments && !self.filters.iter().any(|f| f.kind() == FilterKind::Comment) {
            debug!("adding CommentFilter to render comment overlays");
            self.filters.push(FilterSpec::Comment);
        }
    }

    /// Parse and validate a script.
    pub fn parse(content: &str, format: ScriptFormat) -> Result<Self, ConfigError> {
        let parse_err = |message: String| ConfigError::Parse { format, message };
        let mut script: Self = match format {
            ScriptFormat::Json => {
                serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?
            }
            ScriptFormat::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string()))?,
            ScriptFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?
            }
        };
        script.ensure_comment_filter();
        script.validate()?;
        Ok(script)
    }

    /// Load a script file. The format comes from the extension unless given.
    /// Relative output paths are resolved against the script's directory.
    pub fn load(path: impl AsRef<Path>, format: Option<ScriptFormat>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = match format {
            Some(format) => format,
            None => ScriptFormat::from_path(path)?,
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut script = Self::parse(&content, format)?;
        if let Some(base) = path.parent() {
            script.resolve_paths(base);
        }
        debug!(
            path = %path.display(),
            %format,
            actions = script.actions.len(),
            filters = script.filters.len(),
            "loaded script"
        );
        Ok(script)
    }

    pub fn to_string(&self, format: ScriptFormat) -> Result<String, ConfigError> {
        let ser_err = |message: String| ConfigError::Serialize { format, message };
        match format {
            ScriptFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| ser_err(e.to_string()))
            }
            ScriptFormat::Toml => toml::to_string(self).map_err(|e| ser_err(e.to_string())),
            ScriptFormat::Yaml => serde_yaml::to_string(self).map_err(|e| ser_err(e.to_string())),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>, format: ScriptFormat) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_string(format)?).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.output_file.is_relative() {
            self.output_file = base.join(&self.output_file);
        }
        if let Some(raw) = self.raw_output_file.as_mut().filter(|p| p.is_relative()) {
            *raw = base.join(&*raw);
        }
    }

    /// Check every setting without building anything long-lived.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_config()?;
        self.pipeline()?;
        Ok(())
    }

    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let seconds = |field: &'static str, secs: f64| {
            Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
                field,
                reason: format!("{secs} is not a finite, non-negative number of seconds"),
            })
        };
        let size = |field: &'static str, value: Option<u16>, default: u16| match value {
            Some(0) => Err(ConfigError::InvalidValue {
                field,
                reason: "must be at least 1".to_string(),
            }),
            Some(value) => Ok(value),
            None => Ok(default),
        };
        if !(0.0..=1.0).contains(&self.marker_lead) {
            return Err(ConfigError::InvalidValue {
                field: "marker_lead",
                reason: format!("{} is outside [0, 1]", self.marker_lead),
            });
        }

        Ok(SessionConfig {
            cols: size("cols", self.cols, DEFAULT_COLS)?,
            rows: size("rows", self.rows, DEFAULT_ROWS)?,
            start_delay: seconds("start_delay", self.start_delay)?,
            end_delay: seconds("end_delay", self.end_delay)?,
            typing_delay: self.typing_delay,
            pre_nl_delay: self.pre_nl_delay,
            post_nl_delay: self.post_nl_delay,
            with_comments: self.with_comments,
            comments_at_top: self.comments_at_top,
            marker_lead: self.marker_lead,
        })
    }

    pub fn pipeline(&self) -> Result<FilterPipeline, ConfigError> {
        FilterPipeline::from_specs(&self.filters)
    }

    pub fn delay_model(&self) -> DelayModel {
        match self.seed {
            Some(seed) => DelayModel::seeded(seed),
            None => DelayModel::from_entropy(),
        }
    }

    /// Where the unfiltered recording goes.
    pub fn raw_output_path(&self) -> PathBuf {
        match &self.raw_output_file {
            Some(raw) => raw.clone(),
            None => self.sibling_path("raw"),
        }
    }

    /// Where an interrupted recording is saved, with its markers merged in.
    pub fn partial_output_path(&self) -> PathBuf {
        self.sibling_path("partial")
    }

    fn sibling_path(&self, tag: &str) -> PathBuf {
        let stem = self
            .output_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".to_string());
        self.output_file.with_file_name(format!("{stem}.{tag}.cast"))
    }
}
