use crate::model::{compare_ids, BatchEntry, StudentId, StudentRecord, SummaryKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// Storage key of the persisted student document.
pub const STORE_KEY: &str = "activity_viewer_data";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
    /// The document could not be written, e.g. the quota is exhausted.
    #[error("store was not saved: {0}")]
    WriteFailed(String),
    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// String key/value persistence behind the store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process backend with an optional byte quota.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RefCell<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

#[cfg(test)]
impl MemoryKv {
    pub fn with_quota(quota_bytes: usize) -> Self {
        MemoryKv {
            entries: RefCell::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota_bytes {
            if value.len() > quota {
                return Err(StoreError::WriteFailed(format!(
                    "{} bytes exceeds quota of {} bytes",
                    value.len(),
                    quota
                )));
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Persisted shape: `{ "students": { id: record } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub students: BTreeMap<StudentId, StudentRecord>,
}

impl StoreDocument {
    /// Adds new students and unseen activities. Summaries are never touched and
    /// a stored name is only filled, never replaced. Returns how many
    /// activities were appended.
    pub fn merge(&mut self, batch: &[BatchEntry]) -> usize {
        let mut added = 0usize;
        for entry in batch {
            let record = self
                .students
                .entry(entry.id.clone())
                .or_insert_with(|| StudentRecord::new(entry.id.clone(), entry.name.clone()));
            if record.name.is_empty() && !entry.name.is_empty() {
                record.name = entry.name.clone();
            }
            for incoming in &entry.activities {
                let duplicate = record
                    .activities
                    .iter()
                    .any(|existing| existing.same_occurrence(incoming));
                if !duplicate {
                    record.activities.push(incoming.clone());
                    added += 1;
                }
            }
        }
        added
    }

    pub fn sorted(&self) -> Vec<&StudentRecord> {
        let mut out: Vec<&StudentRecord> = self.students.values().collect();
        out.sort_by(|a, b| compare_ids(&a.id, &b.id));
        out
    }
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub added: usize,
    /// `Err` when the merged state lives only in memory.
    pub saved: Result<(), StoreError>,
}

/// The single long-lived owner of student records, bound to one backend.
pub struct StudentStore<K: KeyValueStore> {
    backend: K,
    doc: StoreDocument,
    quota_bytes: Option<usize>,
}

impl<K: KeyValueStore> StudentStore<K> {
    /// Reads the persisted document. Absent or unreadable documents start an
    /// empty store; only backend failures are errors.
    pub fn load(backend: K) -> Result<Self, StoreError> {
        let doc = match backend.get(STORE_KEY)? {
            None => StoreDocument::default(),
            Some(raw) => match serde_json::from_str::<StoreDocument>(&raw) {
                Ok(doc) => {
                    info!(students = doc.students.len(), "store loaded");
                    doc
                }
                Err(e) => {
                    warn!(error = %e, "persisted store is corrupt; starting empty");
                    StoreDocument::default()
                }
            },
        };
        Ok(StudentStore {
            backend,
            doc,
            quota_bytes: None,
        })
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    pub fn document(&self) -> &StoreDocument {
        &self.doc
    }

    /// Bounds the serialized document size; `None` or `Some(0)` is unlimited.
    pub fn set_quota(&mut self, quota_bytes: Option<usize>) {
        self.quota_bytes = quota_bytes.filter(|q| *q > 0);
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(&self.doc)?;
        if let Some(quota) = self.quota_bytes {
            if serialized.len() > quota {
                let e = StoreError::WriteFailed(format!(
                    "{} bytes exceeds quota of {} bytes",
                    serialized.len(),
                    quota
                ));
                warn!(error = %e, "store save failed");
                return Err(e);
            }
        }
        self.backend.set(STORE_KEY, &serialized).inspect_err(|e| {
            warn!(error = %e, "store save failed");
        })?;
        info!(
            students = self.doc.students.len(),
            bytes = serialized.len(),
            "store saved"
        );
        Ok(())
    }

    pub fn merge(&mut self, batch: &[BatchEntry]) -> MergeOutcome {
        let added = self.doc.merge(batch);
        info!(entries = batch.len(), added, "batch merged");
        MergeOutcome {
            added,
            saved: self.save(),
        }
    }

    pub fn get_student(&self, id: &StudentId) -> Option<&StudentRecord> {
        self.doc.students.get(id)
    }

    pub fn all_students(&self) -> Vec<&StudentRecord> {
        self.doc.sorted()
    }

    /// `Ok(false)` when the id is unknown; nothing is saved in that case.
    pub fn update_summary(
        &mut self,
        id: &StudentId,
        kind: SummaryKind,
        content: &str,
    ) -> Result<bool, StoreError> {
        let Some(record) = self.doc.students.get_mut(id) else {
            return Ok(false);
        };
        match kind {
            SummaryKind::Autonomy => record.autonomy_summary = content.to_string(),
            SummaryKind::Career => record.career_summary = content.to_string(),
        }
        self.save()?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.doc = StoreDocument::default();
        self.backend.remove(STORE_KEY)?;
        info!("store cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ActivityType;
    use crate::model::Activity;

    fn activity(kind: ActivityType, content: &str, date: &str, source: &str, time: &str) -> Activity {
        Activity {
            kind,
            source: source.into(),
            sheet: "Sheet1".into(),
            content: content.into(),
            time: time.into(),
            date: date.into(),
            start_date: String::new(),
            end_date: String::new(),
            area: String::new(),
            school_type: String::new(),
            place: String::new(),
        }
    }

    fn entry(id: &str, name: &str, activities: Vec<Activity>) -> BatchEntry {
        BatchEntry {
            id: StudentId::from(id),
            name: name.into(),
            activities,
        }
    }

    fn sample_batch() -> Vec<BatchEntry> {
        vec![
            entry(
                "1-2-01",
                "가",
                vec![
                    activity(ActivityType::Career, "직업 탐색", "", "진로.xlsx", ""),
                    activity(ActivityType::Autonomy, "학급 회의", "2024-03-02", "자율.xlsx", ""),
                ],
            ),
            entry(
                "1-1-03",
                "나",
                vec![activity(ActivityType::Volunteer, "환경 정화", "2024-04-01", "봉사.xlsx", "2")],
            ),
        ]
    }

    fn total_activities(store: &StudentStore<MemoryKv>) -> usize {
        store.all_students().iter().map(|s| s.activities.len()).sum()
    }

    #[test]
    fn merge_is_idempotent() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        let first = store.merge(&sample_batch());
        assert_eq!(first.added, 3);
        assert!(first.saved.is_ok());
        let snapshot: Vec<StudentRecord> = store.all_students().into_iter().cloned().collect();

        let second = store.merge(&sample_batch());
        assert_eq!(second.added, 0);
        let again: Vec<StudentRecord> = store.all_students().into_iter().cloned().collect();
        assert_eq!(snapshot, again);
        assert_eq!(total_activities(&store), 3);
    }

    #[test]
    fn dedup_ignores_provenance() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        let a = activity(ActivityType::Volunteer, "헌혈", "2024-05-05", "봉사_1.xlsx", "4");
        let b = activity(ActivityType::Volunteer, "헌혈", "2024-05-05", "봉사_2.xlsx", "2");
        let out = store.merge(&[entry("2-1-01", "다", vec![a, b])]);
        assert_eq!(out.added, 1);
        let s = store.get_student(&StudentId::from("2-1-01")).expect("student");
        assert_eq!(s.activities[0].source, "봉사_1.xlsx");
    }

    #[test]
    fn different_type_or_date_is_not_a_duplicate() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        let out = store.merge(&[entry(
            "1-1-01",
            "",
            vec![
                activity(ActivityType::Autonomy, "회의", "2024-01-01", "a", ""),
                activity(ActivityType::Career, "회의", "2024-01-01", "a", ""),
                activity(ActivityType::Autonomy, "회의", "2024-01-02", "a", ""),
            ],
        )]);
        assert_eq!(out.added, 3);
    }

    #[test]
    fn summaries_survive_later_merges() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        store.merge(&sample_batch());
        let id = StudentId::from("1-2-01");
        assert!(store
            .update_summary(&id, SummaryKind::Career, "진로 특기사항")
            .expect("update"));

        let more = vec![entry(
            "1-2-01",
            "다른 이름",
            vec![activity(ActivityType::Career, "대학 탐방", "2024-06-01", "진로2.xlsx", "")],
        )];
        let out = store.merge(&more);
        assert_eq!(out.added, 1);
        let s = store.get_student(&id).expect("student");
        assert_eq!(s.career_summary, "진로 특기사항");
        assert_eq!(s.autonomy_summary, "");
        assert_eq!(s.name, "가");
    }

    #[test]
    fn empty_stored_name_is_filled_by_merge() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        store.merge(&[entry("3-1-01", "", vec![])]);
        store.merge(&[entry("3-1-01", "라", vec![])]);
        let s = store.get_student(&StudentId::from("3-1-01")).expect("student");
        assert_eq!(s.name, "라");
    }

    #[test]
    fn update_summary_for_unknown_id_is_a_noop() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        let updated = store
            .update_summary(&StudentId::from("9-9-99"), SummaryKind::Autonomy, "x")
            .expect("update");
        assert!(!updated);
        assert!(store.backend().get(STORE_KEY).expect("get").is_none());
    }

    #[test]
    fn all_students_sorted_numerically() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        store.merge(&[
            entry("2-1-01", "", vec![]),
            entry("1-10-01", "", vec![]),
            entry("1-2-01", "", vec![]),
        ]);
        let ids: Vec<&str> = store.all_students().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1-2-01", "1-10-01", "2-1-01"]);
    }

    #[test]
    fn persisted_document_reloads() {
        let kv = MemoryKv::default();
        let mut store = StudentStore::load(kv).expect("load");
        store.merge(&sample_batch());
        store
            .update_summary(&StudentId::from("1-1-03"), SummaryKind::Autonomy, "요약")
            .expect("update");
        let raw = store.backend().get(STORE_KEY).expect("get").expect("saved");
        let v: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(v["students"]["1-1-03"]["autonomy_summary"], "요약");
        assert_eq!(v["students"]["1-2-01"]["activities"][1]["type"], "autonomy");

        let kv2 = MemoryKv::default();
        kv2.set(STORE_KEY, &raw).expect("set");
        let reloaded = StudentStore::load(kv2).expect("reload");
        assert_eq!(reloaded.document(), store.document());
    }

    #[test]
    fn corrupt_document_loads_empty() {
        let kv = MemoryKv::default();
        kv.set(STORE_KEY, "{not json").expect("set");
        let store = StudentStore::load(kv).expect("load");
        assert!(store.all_students().is_empty());
    }

    #[test]
    fn write_failure_keeps_memory_state() {
        let mut store = StudentStore::load(MemoryKv::with_quota(16)).expect("load");
        let out = store.merge(&sample_batch());
        assert_eq!(out.added, 3);
        assert!(matches!(out.saved, Err(StoreError::WriteFailed(_))));
        assert_eq!(store.all_students().len(), 2);
        assert!(store.backend().get(STORE_KEY).expect("get").is_none());
    }

    #[test]
    fn store_quota_rejects_oversized_documents() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        store.set_quota(Some(10));
        let out = store.merge(&sample_batch());
        assert!(matches!(out.saved, Err(StoreError::WriteFailed(_))));
        store.set_quota(Some(0));
        assert!(store.save().is_ok());
    }

    #[test]
    fn clear_empties_and_removes_key() {
        let mut store = StudentStore::load(MemoryKv::default()).expect("load");
        store.merge(&sample_batch());
        assert!(store.backend().get(STORE_KEY).expect("get").is_some());
        store.clear().expect("clear");
        assert!(store.all_students().is_empty());
        assert!(store.backend().get(STORE_KEY).expect("get").is_none());
    }
}
