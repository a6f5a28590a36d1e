use crate::db::SqliteKv;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::setup::apply_saved_setup;
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::store::StudentStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let path = PathBuf::from(get_required_str(&req.params, "path")?);

    let kv = SqliteKv::open(&path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:?}")))?;
    let store = StudentStore::load(kv)?;
    let students = store.document().students.len();

    state.workspace = Some(path.clone());
    state.store = Some(store);
    apply_saved_setup(state)?;
    info!(workspace = %path.display(), students, "workspace opened");

    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "students": students
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
