use crate::classify::ActivityType;
use crate::ipc::error::{persist_warning, respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, store, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::{Activity, StudentId, StudentRecord, SummaryKind};
use crate::store::StoreError;
use crate::text::record_bytes;
use serde_json::{json, Value};

struct ListFilter {
    grade: Option<String>,
    class: Option<String>,
    search: Option<String>,
}

impl ListFilter {
    fn from_params(params: &Value) -> Self {
        ListFilter {
            grade: get_optional_str(params, "grade"),
            class: get_optional_str(params, "class"),
            search: get_optional_str(params, "search").map(|s| s.to_lowercase()),
        }
    }

    fn keeps(&self, s: &StudentRecord) -> bool {
        let (grade, class, _) = s.id.parts().unwrap_or(("", "", ""));
        if self.grade.as_deref().is_some_and(|g| g != grade) {
            return false;
        }
        if self.class.as_deref().is_some_and(|c| c != class) {
            return false;
        }
        if let Some(needle) = &self.search {
            let hay = format!("{} {}", s.id, s.name).to_lowercase();
            if !hay.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

fn list_row(s: &StudentRecord) -> Value {
    let (grade, class, number) = s.id.parts().unwrap_or(("", "", ""));
    json!({
        "id": s.id,
        "grade": grade,
        "class": class,
        "number": number,
        "name": s.name,
        "activityCount": s.activities.len(),
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let filter = ListFilter::from_params(&req.params);
    let rows: Vec<Value> = store(state)?
        .all_students()
        .into_iter()
        .filter(|s| filter.keeps(s))
        .map(list_row)
        .collect();
    Ok(json!({ "students": rows }))
}

/// Autonomy first, then career and unclassified activities in encounter order.
fn record_view(activities: &[Activity]) -> Vec<&Activity> {
    let mut out: Vec<&Activity> = activities
        .iter()
        .filter(|a| a.kind != ActivityType::Volunteer)
        .collect();
    out.sort_by_key(|a| a.kind != ActivityType::Autonomy);
    out
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = StudentId::from(get_required_str(&req.params, "id")?.as_str());
    let Some(student) = store(state)?.get_student(&id) else {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: Some(json!({ "id": id })),
        });
    };
    let volunteer: Vec<&Activity> = student
        .activities
        .iter()
        .filter(|a| a.kind == ActivityType::Volunteer)
        .collect();
    Ok(json!({
        "student": student,
        "views": {
            "records": record_view(&student.activities),
            "volunteer": volunteer,
            "summaryBytes": {
                "autonomy": record_bytes(&student.autonomy_summary),
                "career": record_bytes(&student.career_summary),
            }
        }
    }))
}

fn handle_update_summary(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = StudentId::from(get_required_str(&req.params, "id")?.as_str());
    let kind_raw = get_required_str(&req.params, "kind")?;
    let Some(kind) = SummaryKind::parse(&kind_raw) else {
        return Err(HandlerErr::bad_params("kind must be one of: autonomy, career"));
    };
    let Some(content) = req.params.get("content").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("content must be a string"));
    };

    let (updated, warnings) = match store_mut(state)?.update_summary(&id, kind, content) {
        Ok(updated) => (updated, Vec::new()),
        Err(e @ StoreError::WriteFailed(_)) => (true, vec![persist_warning(&e)]),
        Err(e) => return Err(e.into()),
    };
    Ok(json!({
        "updated": updated,
        "persisted": warnings.is_empty(),
        "bytes": record_bytes(content),
        "warnings": warnings,
    }))
}

fn handle_clear(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    store_mut(state)?.clear()?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.get" => handle_get(state, req),
        "students.updateSummary" => handle_update_summary(state, req),
        "store.clear" => handle_clear(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(kind: ActivityType, content: &str) -> Activity {
        Activity {
            kind,
            source: String::new(),
            sheet: String::new(),
            content: content.into(),
            time: String::new(),
            date: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            area: String::new(),
            school_type: String::new(),
            place: String::new(),
        }
    }

    #[test]
    fn record_view_puts_autonomy_first_and_drops_volunteer() {
        let acts = vec![
            activity(ActivityType::Career, "c1"),
            activity(ActivityType::Volunteer, "v1"),
            activity(ActivityType::Autonomy, "a1"),
            activity(ActivityType::Unknown, "u1"),
            activity(ActivityType::Autonomy, "a2"),
        ];
        let got: Vec<&str> = record_view(&acts).iter().map(|a| a.content.as_str()).collect();
        assert_eq!(got, vec!["a1", "a2", "c1", "u1"]);
    }

    #[test]
    fn filter_matches_id_components_and_search() {
        let s = StudentRecord::new(StudentId::from("1-10-03"), "홍길동".into());
        let f = ListFilter::from_params(&json!({ "grade": "1", "class": "10" }));
        assert!(f.keeps(&s));
        let f = ListFilter::from_params(&json!({ "class": "1" }));
        assert!(!f.keeps(&s));
        let f = ListFilter::from_params(&json!({ "search": "길동" }));
        assert!(f.keeps(&s));
        let f = ListFilter::from_params(&json!({ "search": "1-10-0" }));
        assert!(f.keeps(&s));
        let f = ListFilter::from_params(&json!({ "search": "김" }));
        assert!(!f.keeps(&s));
    }
}
