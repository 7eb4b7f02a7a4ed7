//! Action specs: what shape of response the engine wants from an actor

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ParleyError, Result};

/// Placeholder replaced by the actor's name in a call to action.
pub const NAME_PLACEHOLDER: &str = "{name}";

const DEFAULT_CALL_TO_ACTION: &str = "What does {name} do next?";
const FIELD_SEPARATOR: &str = ";;";

/// Shape of the expected response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputType {
    /// Any text
    #[default]
    FreeText,
    /// Exactly one of the listed options
    Choice { options: Vec<String> },
    /// A single number
    Float,
}

impl OutputType {
    fn wire_name(&self) -> &'static str {
        match self {
            OutputType::FreeText => "free",
            OutputType::Choice { .. } => "choice",
            OutputType::Float => "float",
        }
    }
}

/// Request for one action.
///
/// The textual form is `prompt: <text>;;type: free|choice|float;;options: a, b`,
/// with `options` present only for choices and an optional trailing
/// `;;tag: <tag>`. Game masters use it to describe the next action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Question put to the actor; `{name}` is replaced with the actor's name
    pub call_to_action: String,

    #[serde(default)]
    pub output: OutputType,

    /// Free-form label for downstream tooling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Default for ActionSpec {
    fn default() -> Self {
        Self::free_text(DEFAULT_CALL_TO_ACTION)
    }
}

impl ActionSpec {
    /// Ask for free text
    pub fn free_text(call_to_action: impl Into<String>) -> Self {
        Self {
            call_to_action: call_to_action.into(),
            output: OutputType::FreeText,
            tag: None,
        }
    }

    /// Ask for one of `options`
    pub fn choice<I, S>(call_to_action: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            call_to_action: call_to_action.into(),
            output: OutputType::Choice {
                options: options.into_iter().map(Into::into).collect(),
            },
            tag: None,
        }
    }

    /// Ask for a number
    pub fn float(call_to_action: impl Into<String>) -> Self {
        Self {
            call_to_action: call_to_action.into(),
            output: OutputType::Float,
            tag: None,
        }
    }

    /// Builder: attach a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The call to action addressed to `name`.
    pub fn call_to_action_for(&self, name: &str) -> String {
        self.call_to_action.replace(NAME_PLACEHOLDER, name)
    }

    /// Parse the textual form.
    ///
    /// Keys are case-insensitive and unknown keys are ignored. `type` defaults
    /// to free text.
    ///
    /// # Errors
    ///
    /// Fails when the prompt is missing or empty or the type is unknown. A
    /// well-formed choice that lists no options is reported as
    /// `UnsatisfiableActionSpec` with an empty actor.
    pub fn parse(text: &str) -> Result<Self> {
        let mut prompt = None;
        let mut kind = None;
        let mut options = Vec::new();
        let mut tag = None;

        for field in text.trim().split(FIELD_SEPARATOR) {
            let Some((key, value)) = field.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "prompt" => prompt = Some(value.to_string()),
                "type" => kind = Some(value.to_ascii_lowercase()),
                "options" => {
                    options = value
                        .split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                }
                "tag" if !value.is_empty() => tag = Some(value.to_string()),
                _ => {}
            }
        }

        let call_to_action = prompt
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid(text, "missing prompt"))?;

        let output = match kind.as_deref() {
            None | Some("free") | Some("free_text") | Some("text") => OutputType::FreeText,
            Some("float") | Some("number") => OutputType::Float,
            Some("choice") => {
                if options.is_empty() {
                    return Err(ParleyError::UnsatisfiableActionSpec {
                        actor: String::new(),
                        reason: "choice without options".to_string(),
                    });
                }
                OutputType::Choice { options }
            }
            Some(other) => return Err(invalid(text, &format!("unknown type '{}'", other))),
        };

        Ok(Self {
            call_to_action,
            output,
            tag,
        })
    }
}

fn invalid(text: &str, reason: &str) -> ParleyError {
    ParleyError::Other(format!("invalid action spec ({}): {:?}", reason, text))
}

impl FromStr for ActionSpec {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prompt: {}{}type: {}",
            self.call_to_action,
            FIELD_SEPARATOR,
            self.output.wire_name()
        )?;
        if let OutputType::Choice { options } = &self.output {
            write!(f, "{}options: {}", FIELD_SEPARATOR, options.join(", "))?;
        }
        if let Some(tag) = &self.tag {
            write!(f, "{}tag: {}", FIELD_SEPARATOR, tag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_to_action_substitutes_name() {
        let spec = ActionSpec::free_text("What does {name} say to the village?");
        assert_eq!(
            spec.call_to_action_for("P3"),
            "What does P3 say to the village?"
        );
        assert_eq!(ActionSpec::default().call_to_action_for("A"), "What does A do next?");
    }

    #[test]
    fn test_parse_choice() {
        let spec = ActionSpec::parse("prompt: Who should be eliminated?;;type: choice;;options: P1, P2 ,P3")
            .unwrap();
        assert_eq!(spec.call_to_action, "Who should be eliminated?");
        assert_eq!(
            spec.output,
            OutputType::Choice {
                options: vec!["P1".into(), "P2".into(), "P3".into()]
            }
        );
        assert_eq!(spec.tag, None);
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_order() {
        let spec = ActionSpec::parse("  TYPE: Float ;; Prompt: How confident is {name}? ").unwrap();
        assert_eq!(spec.output, OutputType::Float);
        assert_eq!(spec.call_to_action, "How confident is {name}?");

        let spec = ActionSpec::parse("prompt: Speak: briefly").unwrap();
        assert_eq!(spec.output, OutputType::FreeText);
        assert_eq!(spec.call_to_action, "Speak: briefly");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ActionSpec::parse("").is_err());
        assert!(ActionSpec::parse("type: free").is_err());
        assert!(matches!(
            ActionSpec::parse("prompt: Vote;;type: choice"),
            Err(ParleyError::UnsatisfiableActionSpec { ref reason, .. }) if reason == "choice without options"
        ));
        assert!(matches!(
            ActionSpec::parse("prompt: Vote;;type: choice;;options: , ,"),
            Err(ParleyError::UnsatisfiableActionSpec { .. })
        ));
        assert!(ActionSpec::parse("prompt: Vote;;type: ranking").is_err());
        assert!(ActionSpec::parse("just talk").is_err());
    }

    #[test]
    fn test_display_then_parse_is_identity() {
        let specs = [
            ActionSpec::free_text("What does {name} do next?"),
            ActionSpec::choice("Vote", ["P1", "P2"]).with_tag("vote"),
            ActionSpec::float("Rate the argument from 0 to 10"),
        ];
        for spec in specs {
            let text = spec.to_string();
            assert_eq!(text.parse::<ActionSpec>().unwrap(), spec, "{}", text);
        }
    }

    #[test]
    fn test_display_format() {
        let spec = ActionSpec::choice("Vote", ["P1", "P2"]);
        assert_eq!(spec.to_string(), "prompt: Vote;;type: choice;;options: P1, P2");
    }

    #[test]
    fn test_serde_shape() {
        let spec = ActionSpec::choice("Vote", ["yes", "no"]);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["output"]["type"], "choice");
        assert_eq!(json["output"]["options"][1], "no");
        assert!(json.get("tag").is_none());
    }
}
