use crate::header::{ColumnMap, Field};
use crate::model::StudentId;
use crate::workbook::Row;

/// Grade and class carried down a sheet for rows that leave them blank.
/// Start every sheet from `FillDown::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillDown {
    pub last_grade: Option<String>,
    pub last_class: Option<String>,
}

impl FillDown {
    fn advance(&self, grade: Option<&String>, class: Option<&String>) -> FillDown {
        FillDown {
            last_grade: grade.cloned().or_else(|| self.last_grade.clone()),
            last_class: class.cloned().or_else(|| self.last_class.clone()),
        }
    }
}

/// Per-row values, empty strings where the sheet has no column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFields {
    pub name: String,
    pub content: String,
    pub time: String,
    pub date: String,
    pub start_date: String,
    pub end_date: String,
    pub area: String,
    pub school_type: String,
    pub place: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Identified {
        id: StudentId,
        fields: RowFields,
        carry: FillDown,
    },
    Unidentified {
        carry: FillDown,
    },
}

impl Extraction {
    pub fn carry(&self) -> &FillDown {
        match self {
            Extraction::Identified { carry, .. } | Extraction::Unidentified { carry } => carry,
        }
    }
}

fn cell(row: &Row, columns: &ColumnMap, field: Field) -> Option<String> {
    let col = columns.get(field)?;
    row.get(col)?.text()
}

fn field_text(row: &Row, columns: &ColumnMap, field: Field) -> String {
    cell(row, columns, field).unwrap_or_default()
}

/// Reads one data row. Takes the carried grade/class and returns the state to
/// hand to the next row of the same sheet.
pub fn extract_row(row: &Row, columns: &ColumnMap, carry: &FillDown) -> Extraction {
    let grade = cell(row, columns, Field::Grade);
    let class = cell(row, columns, Field::Class);
    let number = cell(row, columns, Field::Number);
    let name = cell(row, columns, Field::Name);

    let has_signal = grade.is_some()
        || class.is_some()
        || number.is_some()
        || name.is_some()
        || cell(row, columns, Field::Content).is_some();
    if !has_signal {
        return Extraction::Unidentified {
            carry: carry.clone(),
        };
    }

    let next = carry.advance(grade.as_ref(), class.as_ref());
    let (Some(grade), Some(class)) = (next.last_grade.as_deref(), next.last_class.as_deref())
    else {
        return Extraction::Unidentified { carry: next };
    };
    // Rows with a name but no number are dropped, not matched by name.
    let Some(number) = number else {
        return Extraction::Unidentified { carry: next };
    };
    let Some(id) = StudentId::from_parts(grade, class, &number) else {
        return Extraction::Unidentified { carry: next };
    };

    let fields = RowFields {
        name: name.unwrap_or_default(),
        content: field_text(row, columns, Field::Content),
        time: field_text(row, columns, Field::Time),
        date: field_text(row, columns, Field::Date),
        start_date: field_text(row, columns, Field::StartDate),
        end_date: field_text(row, columns, Field::EndDate),
        area: field_text(row, columns, Field::Area),
        school_type: field_text(row, columns, Field::SchoolType),
        place: field_text(row, columns, Field::Place),
    };
    Extraction::Identified {
        id,
        fields,
        carry: next,
    }
}
