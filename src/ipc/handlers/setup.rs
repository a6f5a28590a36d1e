use crate::db;
use crate::ingest::{IngestOptions, DEFAULT_EXTENSIONS};
use crate::header::DEFAULT_HEADER_SCAN_ROWS;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, store, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::store::{KeyValueStore, StoreError};
use serde_json::{json, Map, Value};

const INGEST_SECTION_KEY: &str = "setup.ingest";
const DEFAULT_STORAGE_QUOTA_BYTES: i64 = 5 * 1024 * 1024;

fn default_section() -> Value {
    json!({
        "headerScanRows": DEFAULT_HEADER_SCAN_ROWS,
        "storageQuotaBytes": DEFAULT_STORAGE_QUOTA_BYTES,
        "extensions": DEFAULT_EXTENSIONS,
    })
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_extensions(v: &Value, key: &str) -> Result<Vec<String>, String> {
    let arr = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array of strings", key))?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        let s = item
            .as_str()
            .ok_or_else(|| format!("{} must be an array of strings", key))?;
        let s = s.trim().trim_start_matches('.').to_ascii_lowercase();
        if s.is_empty() || s.len() > 8 {
            return Err(format!("{} entries must be 1..=8 characters", key));
        }
        if !out.contains(&s) {
            out.push(s);
        }
    }
    if out.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    Ok(out)
}

fn merge_section_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "headerScanRows" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 200)?));
            }
            "storageQuotaBytes" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, i64::MAX)?));
            }
            "extensions" => {
                obj.insert(k.clone(), json!(parse_extensions(v, k)?));
            }
            _ => return Err(format!("unknown ingest field: {}", k)),
        }
    }
    Ok(())
}

fn load_section(kv: &impl KeyValueStore) -> Result<Value, StoreError> {
    let mut current = default_section();
    if let Some(saved) = db::settings_get_json(kv, INGEST_SECTION_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // Historical values that no longer validate fall back to defaults.
            let mut candidate = current.clone();
            if merge_section_patch(&mut candidate, saved_obj).is_ok() {
                current = candidate;
            }
        }
    }
    Ok(current)
}

/// Ingest options and store quota described by a section value.
fn options_from_section(section: &Value) -> (IngestOptions, Option<usize>) {
    let mut opts = IngestOptions::default();
    if let Some(n) = section.get("headerScanRows").and_then(|v| v.as_u64()) {
        opts.header_scan_rows = n as usize;
    }
    if let Some(arr) = section.get("extensions").and_then(|v| v.as_array()) {
        opts.extensions = arr
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
    }
    let quota = section
        .get("storageQuotaBytes")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize);
    (opts, quota)
}

/// Loads the ingest section of the open workspace into the running state.
pub fn apply_saved_setup(state: &mut AppState) -> Result<(), HandlerErr> {
    let section = load_section(store(state)?.backend())?;
    let (opts, quota) = options_from_section(&section);
    state.ingest = opts;
    store_mut(state)?.set_quota(quota);
    Ok(())
}

fn handle_setup_get(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let ingest = load_section(store(state)?.backend())?;
    Ok(json!({ "ingest": ingest }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let section = get_required_str(&req.params, "section")?;
    if section != "ingest" {
        return Err(HandlerErr::bad_params("unknown section"));
    }
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let kv = store(state)?.backend();
    let mut current = load_section(kv)?;
    merge_section_patch(&mut current, patch_obj).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(kv, INGEST_SECTION_KEY, &current)?;
    apply_saved_setup(state)?;
    Ok(json!({ "ok": true, "ingest": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let (opts, quota) = options_from_section(&default_section());
        assert_eq!(opts.header_scan_rows, 20);
        assert!(opts.accepts("a.xlsx"));
        assert_eq!(quota, Some(5 * 1024 * 1024));
    }

    #[test]
    fn patch_validates_fields() {
        let mut current = default_section();
        merge_section_patch(
            &mut current,
            &patch(json!({ "headerScanRows": 40, "extensions": [".XLSX", "xls", "xls"] })),
        )
        .expect("valid patch");
        assert_eq!(current["headerScanRows"], 40);
        assert_eq!(current["extensions"], json!(["xlsx", "xls"]));

        assert!(merge_section_patch(&mut current, &patch(json!({ "headerScanRows": 0 }))).is_err());
        assert!(merge_section_patch(&mut current, &patch(json!({ "extensions": [] }))).is_err());
        assert!(merge_section_patch(&mut current, &patch(json!({ "color": "red" }))).is_err());
        assert!(
            merge_section_patch(&mut current, &patch(json!({ "storageQuotaBytes": "big" }))).is_err()
        );
    }

    #[test]
    fn malformed_saved_section_falls_back_to_defaults() {
        let kv = MemoryKv::default();
        db::settings_set_json(&kv, INGEST_SECTION_KEY, &json!({ "headerScanRows": -3 }))
            .expect("seed");
        assert_eq!(load_section(&kv).expect("load"), default_section());

        db::settings_set_json(&kv, INGEST_SECTION_KEY, &json!({ "headerScanRows": 7 }))
            .expect("seed");
        assert_eq!(load_section(&kv).expect("load")["headerScanRows"], 7);
    }
}
