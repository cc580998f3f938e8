//! Coyote remote command protocol.
//!
//! Every command is a single-line JSON object followed by a blank line:
//!
//! ```text
//! {"CoyoteAPIVersion":"0.3","CommandName":"Take","Data":{"PK":42}}\r\n\r\n
//! ```

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// API version stamped on every command envelope.
pub const API_VERSION: &str = "0.3";

/// Terminates every command on the wire.
pub const COMMAND_TERMINATOR: &str = "\r\n\r\n";

/// Seek time used when an invocation carries none.
pub const DEFAULT_SEEK_TIME_MS: u64 = 10_000;

/// Option key holding the preset identifier.
pub const OPTION_PRESET_ID: &str = "id";

/// Option key holding the seek time in milliseconds.
pub const OPTION_SEEK_TIME: &str = "seek_time";

/// Actions the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Play,
    Pause,
    End,
    SeekTo,
    TakeNext,
    TakePrev,
    SelectNext,
    SelectPrev,
    SelectPreset,
    Reboot,
    SoftReboot,
    Shutdown,
}

impl ActionKind {
    pub const ALL: [ActionKind; 12] = [
        ActionKind::Play,
        ActionKind::Pause,
        ActionKind::End,
        ActionKind::SeekTo,
        ActionKind::TakeNext,
        ActionKind::TakePrev,
        ActionKind::SelectNext,
        ActionKind::SelectPrev,
        ActionKind::SelectPreset,
        ActionKind::Reboot,
        ActionKind::SoftReboot,
        ActionKind::Shutdown,
    ];

    /// Identifier used by the host to name the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Play => "play",
            ActionKind::Pause => "pause",
            ActionKind::End => "end",
            ActionKind::SeekTo => "seek_to",
            ActionKind::TakeNext => "take_next",
            ActionKind::TakePrev => "take_prev",
            ActionKind::SelectNext => "select_next",
            ActionKind::SelectPrev => "select_prev",
            ActionKind::SelectPreset => "select_preset",
            ActionKind::Reboot => "reboot",
            ActionKind::SoftReboot => "soft_reboot",
            ActionKind::Shutdown => "shutdown",
        }
    }

    /// `CommandName` sent to the device.
    pub fn command_name(&self) -> &'static str {
        match self {
            ActionKind::Play => "Take",
            ActionKind::Pause => "Pause",
            ActionKind::End => "End",
            ActionKind::SeekTo => "SeekTo",
            ActionKind::TakeNext => "TakeNext",
            ActionKind::TakePrev => "TakePrev",
            ActionKind::SelectNext => "SelectNext",
            ActionKind::SelectPrev => "SelectPrev",
            ActionKind::SelectPreset => "SelectPreset",
            ActionKind::Reboot => "RebootCoyote",
            ActionKind::SoftReboot => "SoftRebootCoyote",
            ActionKind::Shutdown => "ShutdownCoyote",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Play => "Play Preset",
            ActionKind::Pause => "Pause Preset",
            ActionKind::End => "End Preset",
            ActionKind::SeekTo => "SeekTo",
            ActionKind::TakeNext => "Play Next Preset",
            ActionKind::TakePrev => "Play Prev Preset",
            ActionKind::SelectNext => "Select Next Preset",
            ActionKind::SelectPrev => "Select Prev Preset",
            ActionKind::SelectPreset => "Select Preset",
            ActionKind::Reboot => "Reboot Coyote",
            ActionKind::SoftReboot => "Soft Reboot Coyote",
            ActionKind::Shutdown => "Shutdown Coyote",
        }
    }

    pub fn takes_preset_id(&self) -> bool {
        matches!(
            self,
            ActionKind::Play
                | ActionKind::Pause
                | ActionKind::End
                | ActionKind::SeekTo
                | ActionKind::SelectPreset
        )
    }

    pub fn takes_seek_time(&self) -> bool {
        matches!(self, ActionKind::SeekTo)
    }

    /// Preset id filled in when the invocation omits one.
    pub fn default_preset_id(&self) -> &'static str {
        match self {
            ActionKind::SelectPreset => "1",
            _ => "0",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| UnknownAction(name.to_string()))
    }
}

/// Identifier of a preset on the device (`PK` on the wire).
///
/// Identifiers written as a canonical `i64` (no `+` sign, no leading zeros)
/// are sent as JSON numbers. Anything else, including `"007"` and values out
/// of `i64` range, is sent verbatim as a JSON string so the device sees
/// exactly what was typed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresetId(String);

impl PresetId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(id.trim().to_string())
    }

    fn from_option(value: Option<&Value>, kind: ActionKind) -> Self {
        match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Self::new(s.as_str()),
            Some(Value::Number(n)) => Self::new(n.to_string()),
            _ => Self::new(kind.default_preset_id()),
        }
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PresetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(n) if n.to_string() == self.0 => serializer.serialize_i64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

/// An action as the host delivers it: a name plus a loose option bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    pub action: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl ActionInvocation {
    pub fn new(kind: ActionKind) -> Self {
        Self::named(kind.as_str())
    }

    pub fn named(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A fully resolved action ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Play { preset: PresetId },
    Pause { preset: PresetId },
    End { preset: PresetId },
    SeekTo { preset: PresetId, time_ms: u64 },
    TakeNext,
    TakePrev,
    SelectNext,
    SelectPrev,
    SelectPreset { preset: PresetId },
    Reboot,
    SoftReboot,
    Shutdown,
    /// An action name this plugin does not know; never reaches the wire.
    Unknown(String),
}

impl Action {
    pub fn from_invocation(invocation: &ActionInvocation) -> Self {
        let kind = match invocation.action.parse::<ActionKind>() {
            Ok(kind) => kind,
            Err(UnknownAction(name)) => return Action::Unknown(name),
        };
        let preset = || PresetId::from_option(invocation.options.get(OPTION_PRESET_ID), kind);

        match kind {
            ActionKind::Play => Action::Play { preset: preset() },
            ActionKind::Pause => Action::Pause { preset: preset() },
            ActionKind::End => Action::End { preset: preset() },
            ActionKind::SeekTo => Action::SeekTo {
                preset: preset(),
                time_ms: seek_time(invocation.options.get(OPTION_SEEK_TIME)),
            },
            ActionKind::TakeNext => Action::TakeNext,
            ActionKind::TakePrev => Action::TakePrev,
            ActionKind::SelectNext => Action::SelectNext,
            ActionKind::SelectPrev => Action::SelectPrev,
            ActionKind::SelectPreset => Action::SelectPreset { preset: preset() },
            ActionKind::Reboot => Action::Reboot,
            ActionKind::SoftReboot => Action::SoftReboot,
            ActionKind::Shutdown => Action::Shutdown,
        }
    }

    pub fn kind(&self) -> Option<ActionKind> {
        let kind = match self {
            Action::Play { .. } => ActionKind::Play,
            Action::Pause { .. } => ActionKind::Pause,
            Action::End { .. } => ActionKind::End,
            Action::SeekTo { .. } => ActionKind::SeekTo,
            Action::TakeNext => ActionKind::TakeNext,
            Action::TakePrev => ActionKind::TakePrev,
            Action::SelectNext => ActionKind::SelectNext,
            Action::SelectPrev => ActionKind::SelectPrev,
            Action::SelectPreset { .. } => ActionKind::SelectPreset,
            Action::Reboot => ActionKind::Reboot,
            Action::SoftReboot => ActionKind::SoftReboot,
            Action::Shutdown => ActionKind::Shutdown,
            Action::Unknown(_) => return None,
        };
        Some(kind)
    }

    /// Wire payload for this action, or `None` for unknown actions.
    pub fn encode(&self) -> Option<String> {
        encode(self)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "CoyoteAPIVersion")]
    api_version: &'static str,
    #[serde(rename = "CommandName")]
    command_name: &'static str,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    data: Option<CommandData<'a>>,
}

#[derive(Serialize)]
struct CommandData<'a> {
    #[serde(rename = "PK")]
    preset: &'a PresetId,
    #[serde(rename = "TimeIndex", skip_serializing_if = "Option::is_none")]
    time_index: Option<u64>,
}

/// Encode an action into its wire form, including the trailing terminator.
pub fn encode(action: &Action) -> Option<String> {
    let kind = action.kind()?;
    let data = match action {
        Action::Play { preset }
        | Action::Pause { preset }
        | Action::End { preset }
        | Action::SelectPreset { preset } => Some(CommandData {
            preset,
            time_index: None,
        }),
        Action::SeekTo { preset, time_ms } => Some(CommandData {
            preset,
            time_index: Some(*time_ms),
        }),
        _ => None,
    };

    let envelope = Envelope {
        api_version: API_VERSION,
        command_name: kind.command_name(),
        data,
    };

    match serde_json::to_string(&envelope) {
        Ok(mut json) => {
            json.push_str(COMMAND_TERMINATOR);
            Some(json)
        }
        Err(err) => {
            tracing::error!(action = %kind, error = %err, "failed to encode command");
            None
        }
    }
}

fn seek_time(value: Option<&Value>) -> u64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        if value.is_some() {
            tracing::debug!(?value, "seek time is not an integer, using default");
        }
        DEFAULT_SEEK_TIME_MS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoded(invocation: ActionInvocation) -> Option<String> {
        Action::from_invocation(&invocation).encode()
    }

    #[test]
    fn play_encodes_numeric_preset() {
        let payload = encoded(ActionInvocation::new(ActionKind::Play).with_option("id", "42"));
        assert_eq!(
            payload.as_deref(),
            Some("{\"CoyoteAPIVersion\":\"0.3\",\"CommandName\":\"Take\",\"Data\":{\"PK\":42}}\r\n\r\n")
        );
    }

    #[test]
    fn seek_to_carries_time_index() {
        let payload = encoded(
            ActionInvocation::new(ActionKind::SeekTo)
                .with_option("id", "3")
                .with_option("seek_time", 5000),
        )
        .expect("seek_to encodes");
        assert_eq!(
            payload,
            "{\"CoyoteAPIVersion\":\"0.3\",\"CommandName\":\"SeekTo\",\"Data\":{\"PK\":3,\"TimeIndex\":5000}}\r\n\r\n"
        );
    }

    #[test]
    fn seek_time_accepts_numeric_strings() {
        let action = Action::from_invocation(
            &ActionInvocation::new(ActionKind::SeekTo)
                .with_option("id", "0")
                .with_option("seek_time", "30000"),
        );
        assert_eq!(
            action,
            Action::SeekTo {
                preset: PresetId::new("0"),
                time_ms: 30_000
            }
        );
    }

    #[test]
    fn missing_options_use_schema_defaults() {
        let action = Action::from_invocation(&ActionInvocation::new(ActionKind::SeekTo));
        assert_eq!(
            action,
            Action::SeekTo {
                preset: PresetId::new("0"),
                time_ms: DEFAULT_SEEK_TIME_MS
            }
        );

        let action = Action::from_invocation(&ActionInvocation::new(ActionKind::SelectPreset));
        assert_eq!(
            action,
            Action::SelectPreset {
                preset: PresetId::new("1")
            }
        );
    }

    #[test]
    fn take_next_has_no_data() {
        let payload = encoded(ActionInvocation::new(ActionKind::TakeNext)).unwrap();
        assert_eq!(
            payload,
            "{\"CoyoteAPIVersion\":\"0.3\",\"CommandName\":\"TakeNext\"}\r\n\r\n"
        );
    }

    #[test]
    fn textual_preset_is_sent_as_string() {
        let payload =
            encoded(ActionInvocation::new(ActionKind::Pause).with_option("id", " intro ")).unwrap();
        assert!(payload.contains("\"Data\":{\"PK\":\"intro\"}"));
    }

    #[test]
    fn non_canonical_integers_keep_their_text() {
        for (id, pk) in [
            ("007", "\"PK\":\"007\""),
            ("+5", "\"PK\":\"+5\""),
            ("99999999999999999999", "\"PK\":\"99999999999999999999\""),
            ("-3", "\"PK\":-3"),
        ] {
            let payload =
                encoded(ActionInvocation::new(ActionKind::Play).with_option("id", id)).unwrap();
            assert!(payload.contains(pk), "{id} encoded as {payload}");
        }
    }

    #[test]
    fn integer_option_value_is_accepted_as_preset() {
        let payload = encoded(ActionInvocation::new(ActionKind::End).with_option("id", 7)).unwrap();
        assert!(payload.contains("\"CommandName\":\"End\",\"Data\":{\"PK\":7}"));
    }

    #[test]
    fn unknown_action_yields_no_payload() {
        let action = Action::from_invocation(&ActionInvocation::named("fade_out"));
        assert_eq!(action, Action::Unknown("fade_out".into()));
        assert!(action.kind().is_none());
        assert!(action.encode().is_none());
    }

    #[test]
    fn every_kind_encodes_its_command_name() {
        for kind in ActionKind::ALL {
            let payload = encoded(ActionInvocation::new(kind)).expect("known kinds encode");
            assert!(payload.ends_with(COMMAND_TERMINATOR));

            let body: Value = serde_json::from_str(payload.trim_end()).unwrap();
            assert_eq!(body["CoyoteAPIVersion"], json!(API_VERSION));
            assert_eq!(body["CommandName"], json!(kind.command_name()));
            assert_eq!(body.get("Data").is_some(), kind.takes_preset_id(), "{kind}");
            assert_eq!(
                body["Data"].get("TimeIndex").is_some(),
                kind.takes_seek_time(),
                "{kind}"
            );
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let invocation = ActionInvocation::new(ActionKind::SeekTo)
            .with_option("id", "12")
            .with_option("seek_time", 1000);
        assert_eq!(encoded(invocation.clone()), encoded(invocation));
    }

    #[test]
    fn action_names_round_trip_through_from_str() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>(), Ok(kind));
        }
        assert!("id_play".parse::<ActionKind>().is_err());
    }

    #[test]
    fn invocation_deserializes_from_host_json() {
        let invocation: ActionInvocation =
            serde_json::from_str(r#"{"action":"select_preset","options":{"id":"5"}}"#).unwrap();
        assert_eq!(
            Action::from_invocation(&invocation),
            Action::SelectPreset {
                preset: PresetId::new("5")
            }
        );
    }
}
