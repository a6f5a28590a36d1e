use crate::ingest::{collect_folder, ingest_files, read_sources, IngestReport};
use crate::ipc::error::{persist_warning, respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, store, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::model::BatchEntry;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

struct Run {
    id: String,
    started_at: String,
    report: IngestReport,
}

/// Files named by `paths`, in the given order, or every file under
/// `folderPath` sorted by path.
fn requested_paths(params: &Value) -> Result<Vec<PathBuf>, HandlerErr> {
    if let Some(arr) = params.get("paths").and_then(|v| v.as_array()) {
        let mut out = Vec::with_capacity(arr.len());
        for v in arr {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params("paths must be an array of strings"))?;
            out.push(PathBuf::from(s));
        }
        return Ok(out);
    }
    let Some(folder) = get_optional_str(params, "folderPath") else {
        return Err(HandlerErr::bad_params("missing paths or folderPath"));
    };
    collect_folder(&PathBuf::from(&folder)).map_err(|e| HandlerErr {
        code: "bad_params",
        message: format!("cannot read folder: {e}"),
        details: Some(json!({ "folderPath": folder })),
    })
}

fn run_ingest(state: &AppState, params: &Value) -> Result<Run, HandlerErr> {
    let paths = requested_paths(params)?;
    let id = Uuid::new_v4().to_string();
    let started_at = chrono::Utc::now().to_rfc3339();
    info!(run = %id, files = paths.len(), "ingest started");

    let (files, read_failures) = read_sources(&paths, &state.ingest);
    let mut report = ingest_files(&files, &state.ingest);
    let mut failures = read_failures;
    failures.append(&mut report.failures);
    report.failures = failures;
    Ok(Run {
        id,
        started_at,
        report,
    })
}

fn handle_parse(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let run = run_ingest(state, &req.params)?;
    Ok(json!({
        "runId": run.id,
        "startedAt": run.started_at,
        "students": run.report.batch,
        "filesProcessed": run.report.files_processed,
        "failures": run.report.failures,
        "warnings": run.report.warnings,
    }))
}

fn merge_batch(state: &mut AppState, batch: &[BatchEntry]) -> Result<(usize, Vec<Value>), HandlerErr> {
    let outcome = store_mut(state)?.merge(batch);
    let mut warnings = Vec::new();
    if let Err(e) = &outcome.saved {
        warnings.push(persist_warning(e));
    }
    Ok((outcome.added, warnings))
}

fn handle_merge(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    store(state)?;
    let raw = req
        .params
        .get("students")
        .cloned()
        .ok_or_else(|| HandlerErr::bad_params("missing students"))?;
    let batch: Vec<BatchEntry> = serde_json::from_value(raw)
        .map_err(|e| HandlerErr::bad_params(format!("invalid students: {e}")))?;
    let (added, warnings) = merge_batch(state, &batch)?;
    Ok(json!({
        "added": added,
        "persisted": warnings.is_empty(),
        "warnings": warnings,
    }))
}

fn handle_run(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    // Check before reading any file so a missing workspace costs nothing.
    store(state)?;
    let run = run_ingest(state, &req.params)?;
    let (added, persist_warnings) = merge_batch(state, &run.report.batch)?;
    let persisted = persist_warnings.is_empty();
    let mut warnings: Vec<Value> = run
        .report
        .warnings
        .iter()
        .map(|w| json!(w))
        .collect();
    warnings.extend(persist_warnings);
    info!(
        run = %run.id,
        students = run.report.batch.len(),
        added,
        persisted,
        "ingest merged"
    );
    Ok(json!({
        "runId": run.id,
        "startedAt": run.started_at,
        "studentsParsed": run.report.batch.len(),
        "added": added,
        "filesProcessed": run.report.files_processed,
        "failures": run.report.failures,
        "warnings": warnings,
        "persisted": persisted,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "ingest.parse" => handle_parse(state, req),
        "ingest.run" => handle_run(state, req),
        "store.merge" => handle_merge(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
