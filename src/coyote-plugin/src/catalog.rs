//! Static definitions the host uses to build its forms and buttons.

use crate::protocol::{ActionInvocation, ActionKind, OPTION_PRESET_ID, OPTION_SEEK_TIME};
use serde::Serialize;

/// Host-side validation pattern for IPv4 addresses.
pub const REGEX_IP: &str = r"/^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$/";

/// Host-side validation pattern for ports 1-65535.
pub const REGEX_PORT: &str = r"/^([1-9]|[1-8][0-9]|9[0-9]|[1-8][0-9]{2}|9[0-8][0-9]|99[0-9]|[1-8][0-9]{3}|9[0-8][0-9]{2}|99[0-8][0-9]|999[0-9]|[1-5][0-9]{4}|6[0-4][0-9]{3}|65[0-4][0-9]{2}|655[0-2][0-9]|6553[0-5])$/";

/// Host-side validation pattern for plain integers.
pub const REGEX_NUMBER: &str = r"/^\d+$/";

const SEEK_TIME_MIN: u64 = 1;
const SEEK_TIME_MAX: u64 = 10_000_000;
const PRESET_TEXT_SIZE: &str = "18";
const WHITE: u32 = 0xFF_FF_FF;
const BLACK: u32 = 0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDefinition {
    pub id: ActionKind,
    pub label: &'static str,
    pub options: Vec<InputField>,
}

/// A single form input, as the host renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputField {
    /// Read-only informational text.
    Text {
        id: &'static str,
        label: &'static str,
        width: u8,
        value: &'static str,
    },
    #[serde(rename = "textinput")]
    TextInput {
        id: &'static str,
        label: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        regex: Option<&'static str>,
    },
    Number {
        id: &'static str,
        label: &'static str,
        min: u64,
        max: u64,
        default: u64,
        required: bool,
        range: bool,
        regex: &'static str,
    },
    Dropdown {
        id: &'static str,
        label: &'static str,
        default: &'static str,
        choices: Vec<Choice>,
    },
}

impl InputField {
    pub fn id(&self) -> &'static str {
        match self {
            InputField::Text { id, .. }
            | InputField::TextInput { id, .. }
            | InputField::Number { id, .. }
            | InputField::Dropdown { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub id: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresetCategory {
    Commands,
    System,
}

/// Button appearance for a preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonStyle {
    pub style: &'static str,
    pub text: String,
    pub size: &'static str,
    pub color: u32,
    pub bgcolor: u32,
}

/// A ready-made button that fires one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresetDefinition {
    pub category: PresetCategory,
    pub label: String,
    pub bank: ButtonStyle,
    pub actions: Vec<ActionInvocation>,
}

impl PresetDefinition {
    fn new(category: PresetCategory, label: impl Into<String>, action: ActionInvocation) -> Self {
        let label = label.into();
        Self {
            category,
            bank: ButtonStyle {
                style: "text",
                text: label.clone(),
                size: PRESET_TEXT_SIZE,
                color: WHITE,
                bgcolor: BLACK,
            },
            label,
            actions: vec![action],
        }
    }
}

fn preset_id_field(default: &'static str) -> InputField {
    InputField::TextInput {
        id: OPTION_PRESET_ID,
        label: "Preset ID:",
        default: Some(default),
        width: Some(6),
        regex: None,
    }
}

fn seek_time_field() -> InputField {
    InputField::Number {
        id: OPTION_SEEK_TIME,
        label: "Time in ms (10 sec = 10000):",
        min: SEEK_TIME_MIN,
        max: SEEK_TIME_MAX,
        default: crate::protocol::DEFAULT_SEEK_TIME_MS,
        required: true,
        range: false,
        regex: REGEX_NUMBER,
    }
}

/// Every action with the inputs its form needs.
pub fn actions() -> Vec<ActionDefinition> {
    ActionKind::ALL
        .into_iter()
        .map(|kind| {
            let mut options = Vec::new();
            if kind.takes_preset_id() {
                options.push(preset_id_field(kind.default_preset_id()));
            }
            if kind.takes_seek_time() {
                options.push(seek_time_field());
            }
            ActionDefinition {
                id: kind,
                label: kind.label(),
                options,
            }
        })
        .collect()
}

const COMMAND_BUTTONS: [(ActionKind, &str); 8] = [
    (ActionKind::Play, "Play"),
    (ActionKind::Pause, "Pause"),
    (ActionKind::End, "End"),
    (ActionKind::TakeNext, "Take Next"),
    (ActionKind::TakePrev, "Take Prev"),
    (ActionKind::SelectNext, "Select Next"),
    (ActionKind::SelectPrev, "Select Prev"),
    (ActionKind::SelectPreset, "Select Preset"),
];

const SEEK_BUTTONS: [(&str, u64); 4] = [
    ("Seek to 1 sec", 1_000),
    ("Seek to 5 sec", 5_000),
    ("Seek to 10 sec", 10_000),
    ("Seek to 30 sec", 30_000),
];

const SYSTEM_BUTTONS: [(ActionKind, &str); 3] = [
    (ActionKind::Reboot, "Reboot"),
    (ActionKind::SoftReboot, "Soft Reboot"),
    (ActionKind::Shutdown, "Shutdown"),
];

/// One-click buttons offered to the host.
pub fn presets() -> Vec<PresetDefinition> {
    let commands = COMMAND_BUTTONS.into_iter().map(|(kind, label)| {
        let mut action = ActionInvocation::new(kind);
        if kind.takes_preset_id() {
            action = action.with_option(OPTION_PRESET_ID, "0");
        }
        PresetDefinition::new(PresetCategory::Commands, label, action)
    });

    let seeks = SEEK_BUTTONS.into_iter().map(|(label, time_ms)| {
        let action = ActionInvocation::new(ActionKind::SeekTo)
            .with_option(OPTION_PRESET_ID, "0")
            .with_option(OPTION_SEEK_TIME, time_ms.to_string());
        PresetDefinition::new(PresetCategory::Commands, label, action)
    });

    let system = SYSTEM_BUTTONS.into_iter().map(|(kind, label)| {
        PresetDefinition::new(PresetCategory::System, label, ActionInvocation::new(kind))
    });

    commands.chain(seeks).chain(system).collect()
}

/// Connection settings form shown in the host's instance config.
pub fn config_fields() -> Vec<InputField> {
    vec![
        InputField::Text {
            id: "info",
            label: "Information",
            width: 12,
            value: "Please keep in mind that UDP support on port 9000 is not implemented yet in the Coyote firmware.",
        },
        InputField::TextInput {
            id: "host",
            label: "Target IP",
            default: None,
            width: Some(5),
            regex: Some(REGEX_IP),
        },
        InputField::TextInput {
            id: "port",
            label: "Target Port (Default: 7000)",
            default: Some("7000"),
            width: Some(3),
            regex: Some(REGEX_PORT),
        },
        InputField::Dropdown {
            id: "prot",
            label: "Connect with TCP / UDP",
            default: "tcp",
            choices: vec![
                Choice {
                    id: "tcp",
                    label: "TCP",
                },
                Choice {
                    id: "udp",
                    label: "UDP",
                },
            ],
        },
    ]
}
