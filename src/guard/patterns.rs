//! Substring pattern tables for the rules-first Guard.
//!
//! The tables are the union of the two rule sets in the upstream
//! deployment; where they overlapped, the enhanced set's category order
//! takes precedence. Latin patterns are stored lowercase and matched
//! against case-folded input; CJK patterns match as-is.

use serde::{Deserialize, Serialize};

/// Wakeword class, in descending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakewordType {
    Emergency,
    Primary,
    Attention,
}

/// SOS category, in descending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SosCategory {
    Explicit,
    Medical,
    Fall,
    Confusion,
    Emotional,
}

/// Implicit command class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    TemperatureControl,
    LightingControl,
    AssistanceRequest,
    SocialInteraction,
}

impl CommandType {
    /// Topic string recorded in the conversation context.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemperatureControl => "temperature_control",
            Self::LightingControl => "lighting_control",
            Self::AssistanceRequest => "assistance_request",
            Self::SocialInteraction => "social_interaction",
        }
    }
}

/// Wakeword scan order.
pub const WAKEWORD_PRIORITY: &[WakewordType] = &[
    WakewordType::Emergency,
    WakewordType::Primary,
    WakewordType::Attention,
];

/// SOS scan order.
pub const SOS_PRIORITY: &[SosCategory] = &[
    SosCategory::Explicit,
    SosCategory::Medical,
    SosCategory::Fall,
    SosCategory::Confusion,
    SosCategory::Emotional,
];

/// Implicit command scan order (tie-break order for equal confidence).
pub const COMMAND_PRIORITY: &[CommandType] = &[
    CommandType::TemperatureControl,
    CommandType::LightingControl,
    CommandType::AssistanceRequest,
    CommandType::SocialInteraction,
];

/// Built-in wakeword patterns per type.
#[must_use]
pub fn wakeword_patterns(wake_type: WakewordType) -> &'static [&'static str] {
    match wake_type {
        WakewordType::Primary => &["小伴", "机器人", "companion", "robot"],
        WakewordType::Emergency => &["救命", "救我", "help", "emergency"],
        WakewordType::Attention => &["听着", "注意", "listen", "attention"],
    }
}

/// Built-in SOS patterns per category.
#[must_use]
pub fn sos_patterns(category: SosCategory) -> &'static [&'static str] {
    match category {
        SosCategory::Explicit => &["救命", "sos", "求救", "help", "emergency"],
        SosCategory::Medical => &[
            "心脏病",
            "中风",
            "呼吸困难",
            "胸痛",
            "心脏很疼",
            "heart attack",
            "stroke",
            "chest pain",
        ],
        SosCategory::Fall => &["摔倒", "跌倒", "起不来", "fallen", "fell down", "cant get up"],
        SosCategory::Confusion => &["迷路", "不记得", "糊涂", "lost", "confused", "dont remember"],
        SosCategory::Emotional => &["害怕", "孤独", "绝望", "scared", "lonely", "desperate"],
    }
}

/// Built-in implicit-command patterns per type.
#[must_use]
pub fn implicit_patterns(command: CommandType) -> &'static [&'static str] {
    match command {
        CommandType::TemperatureControl => &["冷", "热", "温度", "cold", "hot", "temperature"],
        CommandType::LightingControl => &["暗", "亮", "dark", "bright"],
        CommandType::AssistanceRequest => &["帮我", "不会", "help me", "dont know how"],
        CommandType::SocialInteraction => &["孤独", "无聊", "聊天", "lonely", "bored", "talk"],
    }
}

/// Smart-home nouns: pattern → device kind.
pub const DEVICE_NOUNS: &[(&str, &str)] = &[
    ("灯", "light"),
    ("light", "light"),
    ("lamp", "light"),
    ("空调", "hvac"),
    ("hvac", "hvac"),
    ("air con", "hvac"),
];

/// Room qualifiers: pattern → room id.
pub const ROOM_QUALIFIERS: &[(&str, &str)] = &[
    ("客厅", "living_room"),
    ("living room", "living_room"),
    ("卧室", "bedroom"),
    ("bedroom", "bedroom"),
    ("厨房", "kitchen"),
    ("kitchen", "kitchen"),
    ("浴室", "bathroom"),
    ("卫生间", "bathroom"),
    ("bathroom", "bathroom"),
];

/// On-verbs for direct extraction.
pub const ON_VERBS: &[&str] = &["开", "turn on", "switch on"];

/// Off-verbs for direct extraction.
pub const OFF_VERBS: &[&str] = &["关", "turn off", "switch off"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_cover_all_variants() {
        assert_eq!(WAKEWORD_PRIORITY.len(), 3);
        assert_eq!(SOS_PRIORITY.len(), 5);
        assert_eq!(COMMAND_PRIORITY.len(), 4);
    }

    #[test]
    fn latin_patterns_are_lowercase() {
        for category in SOS_PRIORITY {
            for pattern in sos_patterns(*category) {
                assert_eq!(
                    pattern.to_lowercase().as_str(),
                    *pattern,
                    "pattern not case-folded: {pattern}"
                );
            }
        }
    }

    #[test]
    fn command_topic_strings() {
        assert_eq!(CommandType::LightingControl.as_str(), "lighting_control");
        assert_eq!(CommandType::SocialInteraction.as_str(), "social_interaction");
    }
}
