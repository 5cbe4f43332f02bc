//! Script actions: the steps the [`Typist`](crate::engine::Typist) performs.
//!
//! In a script file an action is either a bare string, typed as a line with
//! the session's default delays, or a table tagged by `action_id`:
//!
//! ```yaml
//! actions:
//!   - ls -la
//!   - action_id: Input
//!     text: du -h *
//!     pre_nl_delay: 1.0
//!     post_nl_delay: [2.5, 3.0]
//!   - action_id: Marker
//!     label: Disk usage
//!   - action_id: Comment
//!     comment: What is the total?
//! ```

use serde::{Deserialize, Serialize};

use crate::config::DelayRange;

/// A line of input, typed character by character and submitted with a newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub text: String,
    /// Pause before the newline; the session default when `None`.
    pub pre_nl_delay: Option<DelayRange>,
    /// Pause after the newline; the session default when `None`.
    pub post_nl_delay: Option<DelayRange>,
}

impl InputLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pre_nl_delay: None,
            post_nl_delay: None,
        }
    }

    pub fn with_delays(mut self, pre_nl: DelayRange, post_nl: DelayRange) -> Self {
        self.pre_nl_delay = Some(pre_nl);
        self.post_nl_delay = Some(post_nl);
        self
    }
}

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ActionRepr", into = "ActionRepr")]
pub enum Action {
    /// Type a line of input.
    Input(InputLine),
    /// Stamp a named marker at the current session time.
    Marker { label: String },
    /// Show a comment overlay from this point on.
    Comment { text: String },
}

impl Action {
    pub fn input(text: impl Into<String>) -> Self {
        Self::Input(InputLine::new(text))
    }

    pub fn marker(label: impl Into<String>) -> Self {
        Self::Marker {
            label: label.into(),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment { text: text.into() }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ActionRepr {
    Line(String),
    Tagged(TaggedAction),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "action_id")]
enum TaggedAction {
    Input {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pre_nl_delay: Option<DelayRange>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        post_nl_delay: Option<DelayRange>,
    },
    Marker {
        label: String,
    },
    Comment {
        #[serde(alias = "text")]
        comment: String,
    },
}

impl From<ActionRepr> for Action {
    fn from(repr: ActionRepr) -> Self {
        match repr {
            ActionRepr::Line(text) => Self::input(text),
            ActionRepr::Tagged(TaggedAction::Input {
                text,
                pre_nl_delay,
                post_nl_delay,
            }) => Self::Input(InputLine {
                text,
                pre_nl_delay,
                post_nl_delay,
            }),
            ActionRepr::Tagged(TaggedAction::Marker { label }) => Self::Marker { label },
            ActionRepr::Tagged(TaggedAction::Comment { comment }) => {
                Self::Comment { text: comment }
            }
        }
    }
}

impl From<Action> for ActionRepr {
    fn from(action: Action) -> Self {
        match action {
            Action::Input(InputLine {
                text,
                pre_nl_delay: None,
                post_nl_delay: None,
            }) => Self::Line(text),
            Action::Input(line) => Self::Tagged(TaggedAction::Input {
                text: line.text,
                pre_nl_delay: line.pre_nl_delay,
                post_nl_delay: line.post_nl_delay,
            }),
            Action::Marker { label } => Self::Tagged(TaggedAction::Marker { label }),
            Action::Comment { text } => Self::Tagged(TaggedAction::Comment { comment: text }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_mixed_actions() {
        let json = r#"[
            "ls",
            {"action_id": "Input", "text": "du -h *", "pre_nl_delay": 1, "post_nl_delay": [2.5, 3.0]},
            {"action_id": "Marker", "label": "Sum"},
            {"action_id": "Comment", "comment": "Goodbye"},
            {"action_id": "Comment", "text": "alias"}
        ]"#;
        let actions: Vec<Action> = serde_json::from_str(json).unwrap();

        assert_eq!(actions[0], Action::input("ls"));
        let Action::Input(line) = &actions[1] else {
            panic!("expected input, got {:?}", actions[1]);
        };
        assert_eq!(line.text, "du -h *");
        assert_eq!(
            line.pre_nl_delay,
            Some(DelayRange::fixed(Duration::from_secs(1)))
        );
        let post = line.post_nl_delay.unwrap();
        assert_eq!(post.min(), Duration::from_millis(2500));
        assert_eq!(post.max(), Duration::from_secs(3));
        assert_eq!(actions[2], Action::marker("Sum"));
        assert_eq!(actions[3], Action::comment("Goodbye"));
        assert_eq!(actions[4], Action::comment("alias"));
    }

    #[test]
    fn test_plain_input_serializes_as_string() {
        let actions = vec![Action::input("exit"), Action::marker("END")];
        let json = serde_json::to_string(&actions).unwrap();
        assert_eq!(json, r#"["exit",{"action_id":"Marker","label":"END"}]"#);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let json = r#"[{"action_id": "Input", "text": "x", "pre_nl_delay": [2.0, 1.0]}]"#;
        assert!(serde_json::from_str::<Vec<Action>>(json).is_err());
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let json = r#"[{"action_id": "Sleep", "seconds": 1}]"#;
        assert!(serde_json::from_str::<Vec<Action>>(json).is_err());
    }
}
