use crate::classify::ActivityType;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Canonical `"{grade}-{class}-{number}"` key, number zero-padded to two digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StudentId(String);

#[derive(Debug, Error)]
#[error("invalid student id {0:?}: expected grade-class-number with a 2+ digit number")]
pub struct InvalidStudentId(String);

impl StudentId {
    /// Builds an id from raw cell text. Every non-digit character is dropped;
    /// if any part ends up empty there is no id.
    pub fn from_parts(grade: &str, class: &str, number: &str) -> Option<StudentId> {
        let grade = digits_only(grade);
        let class = digits_only(class);
        let number = digits_only(number);
        if grade.is_empty() || class.is_empty() || number.is_empty() {
            return None;
        }
        Some(StudentId(format!("{grade}-{class}-{number:0>2}")))
    }

    /// Accepts only the canonical form `from_parts` produces: three all-digit
    /// parts, the number at least two digits long.
    pub fn parse(raw: &str) -> Result<StudentId, InvalidStudentId> {
        let mut parts = raw.split('-');
        let canonical = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(c), Some(n), None) => {
                is_digits(g) && is_digits(c) && is_digits(n) && n.len() >= 2
            }
            _ => false,
        };
        if canonical {
            Ok(StudentId(raw.to_string()))
        } else {
            Err(InvalidStudentId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into the three id components.
    pub fn parts(&self) -> Option<(&str, &str, &str)> {
        let mut it = self.0.split('-');
        let grade = it.next()?;
        let class = it.next()?;
        let number = it.next()?;
        if it.next().is_some() {
            return None;
        }
        Some((grade, class, number))
    }

    /// Numeric (grade, class, number). `None` only for lookup ids built with
    /// `From<&str>` from arbitrary text.
    pub fn sort_key(&self) -> Option<(u64, u64, u64)> {
        let (g, c, n) = self.parts()?;
        Some((g.parse().ok()?, c.parse().ok()?, n.parse().ok()?))
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(s: &str) -> Self {
        StudentId(s.to_string())
    }
}

impl TryFrom<String> for StudentId {
    type Error = InvalidStudentId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        StudentId::parse(&raw)
    }
}

impl From<StudentId> for String {
    fn from(id: StudentId) -> Self {
        id.0
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Numeric per-component order; ids that do not parse go last, by text.
pub fn compare_ids(a: &StudentId, b: &StudentId) -> Ordering {
    match (a.sort_key(), b.sort_key()) {
        (Some(ka), Some(kb)) => ka.cmp(&kb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// One recorded occurrence. Two activities are the same occurrence when
/// `type`, `content` and `date` agree; provenance is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sheet: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start_date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end_date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub area: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub school_type: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub place: String,
}

impl Activity {
    pub fn same_occurrence(&self, other: &Activity) -> bool {
        self.kind == other.kind && self.content == other.content && self.date == other.date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub autonomy_summary: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub career_summary: String,
}

impl StudentRecord {
    pub fn new(id: StudentId, name: String) -> Self {
        StudentRecord {
            id,
            name,
            activities: Vec::new(),
            autonomy_summary: String::new(),
            career_summary: String::new(),
        }
    }
}

/// One student's share of a parsed batch. Never carries summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub id: StudentId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Autonomy,
    Career,
}

impl SummaryKind {
    pub fn parse(s: &str) -> Option<SummaryKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "autonomy" => Some(SummaryKind::Autonomy),
            "career" => Some(SummaryKind::Career),
            _ => None,
        }
    }
}

// Older documents stored raw cell values, so numbers and nulls show up where
// text is expected.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = serde_json::Value::deserialize(deserializer)?;
    Ok(match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Bool(b) => (if b { "TRUE" } else { "FALSE" }).to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    })
}
