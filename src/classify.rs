use serde::{Deserialize, Serialize};

/// Category of a recorded activity, decided by the file it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Autonomy,
    Career,
    Volunteer,
    #[serde(other)]
    Unknown,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Autonomy => "autonomy",
            ActivityType::Career => "career",
            ActivityType::Volunteer => "volunteer",
            ActivityType::Unknown => "unknown",
        }
    }
}

// Checked in order; the first keyword found in the file name wins.
const FILE_KEYWORDS: &[(&str, ActivityType)] = &[
    ("자율", ActivityType::Autonomy),
    ("진로", ActivityType::Career),
    ("봉사", ActivityType::Volunteer),
];

pub fn classify(file_name: &str) -> ActivityType {
    FILE_KEYWORDS
        .iter()
        .find(|(kw, _)| file_name.contains(kw))
        .map(|(_, t)| *t)
        .unwrap_or(ActivityType::Unknown)
}
