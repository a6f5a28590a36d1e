use crate::workbook::Row;
use std::collections::HashMap;

pub const DEFAULT_HEADER_SCAN_ROWS: usize = 20;

/// Semantic row attributes a spreadsheet column can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Grade,
    Class,
    Number,
    Name,
    Content,
    Time,
    Date,
    StartDate,
    EndDate,
    Area,
    SchoolType,
    Place,
}

/// How one field recognises its column label. A label matches when it equals
/// one of `exact`, contains every entry of a non-empty `all_of`, or contains
/// any entry of `any_of` and none of `unless`.
struct LabelRule {
    field: Field,
    exact: &'static [&'static str],
    any_of: &'static [&'static str],
    all_of: &'static [&'static str],
    unless: &'static [&'static str],
}

impl LabelRule {
    const fn any(field: Field, any_of: &'static [&'static str]) -> Self {
        LabelRule {
            field,
            exact: &[],
            any_of,
            all_of: &[],
            unless: &[],
        }
    }

    fn matches(&self, label: &str) -> bool {
        if self.exact.iter().any(|e| label == *e) {
            return true;
        }
        if !self.all_of.is_empty() && self.all_of.iter().all(|p| label.contains(p)) {
            return true;
        }
        self.any_of.iter().any(|p| label.contains(p)) && !self.unless.iter().any(|p| label.contains(p))
    }
}

// Precedence order: the first rule that matches decides the field, so e.g.
// "시작일자" is a start date and never a plain date, and "반/번호" is a number.
const LABEL_RULES: &[LabelRule] = &[
    LabelRule::any(Field::Grade, &["학년"]),
    LabelRule {
        field: Field::Class,
        exact: &[],
        any_of: &["반"],
        all_of: &[],
        unless: &["번"],
    },
    LabelRule {
        field: Field::Number,
        exact: &["번"],
        any_of: &["번호"],
        all_of: &[],
        unless: &[],
    },
    LabelRule::any(Field::Name, &["이름", "성명"]),
    LabelRule::any(Field::Content, &["내용", "특기사항"]),
    LabelRule::any(Field::Time, &["시간"]),
    LabelRule::any(Field::StartDate, &["시작"]),
    LabelRule::any(Field::EndDate, &["종료"]),
    LabelRule::any(Field::Area, &["영역"]),
    LabelRule {
        field: Field::SchoolType,
        exact: &[],
        any_of: &["구분"],
        all_of: &["학교", "개인"],
        unless: &[],
    },
    LabelRule::any(Field::Place, &["장소", "기관"]),
    LabelRule::any(Field::Date, &["일자", "기간", "날짜", "일시"]),
];

/// Drops all whitespace and lower-cases, so "학생 성명" and "학생성명" compare equal.
pub fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Field a single raw label maps to, if any.
pub fn match_label(raw: &str) -> Option<Field> {
    let label = normalize_label(raw);
    if label.is_empty() {
        return None;
    }
    LABEL_RULES
        .iter()
        .find(|rule| rule.matches(&label))
        .map(|rule| rule.field)
}

/// Field → column position for one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Keeps the first column seen for a field.
    pub fn insert_first(&mut self, field: Field, col: usize) {
        self.columns.entry(field).or_insert(col);
    }

    fn identifies_students(&self) -> bool {
        self.contains(Field::Name) || (self.contains(Field::Grade) && self.contains(Field::Class))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    pub row_index: usize,
    pub columns: ColumnMap,
}

pub fn map_columns(row: &Row) -> ColumnMap {
    let mut columns = ColumnMap::default();
    for (col, cell) in row.iter().enumerate() {
        let Some(label) = cell.label() else {
            continue;
        };
        if let Some(field) = match_label(label) {
            columns.insert_first(field, col);
        }
    }
    columns
}

/// First row within `max_scan` that names students, either through a name
/// column or through grade and class columns.
pub fn resolve_header(rows: &[Row], max_scan: usize) -> Option<HeaderMatch> {
    rows.iter()
        .take(max_scan)
        .enumerate()
        .find_map(|(row_index, row)| {
            let columns = map_columns(row);
            columns
                .identifies_students()
                .then_some(HeaderMatch { row_index, columns })
        })
}
