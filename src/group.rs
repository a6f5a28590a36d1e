use crate::model::{Activity, BatchEntry, StudentId};
use std::collections::HashMap;

/// One identified row, ready to be folded per student.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub id: StudentId,
    pub name: String,
    pub activity: Activity,
}

/// Folds rows into per-student entries, in order of first appearance.
/// Activities keep file/sheet/row order; the first non-empty name sticks.
pub fn group_by_student(rows: Vec<Extracted>) -> Vec<BatchEntry> {
    let mut order: Vec<BatchEntry> = Vec::new();
    let mut index: HashMap<StudentId, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.id.clone()).or_insert_with(|| {
            order.push(BatchEntry {
                id: row.id.clone(),
                name: row.name.clone(),
                activities: Vec::new(),
            });
            order.len() - 1
        });
        let entry = &mut order[slot];
        if entry.name.is_empty() && !row.name.is_empty() {
            entry.name = row.name;
        }
        entry.activities.push(row.activity);
    }
    order
}
