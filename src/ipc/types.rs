use std::path::PathBuf;

use serde::Deserialize;

use crate::db::SqliteKv;
use crate::ingest::IngestOptions;
use crate::store::StudentStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<StudentStore<SqliteKv>>,
    pub ingest: IngestOptions,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            store: None,
            ingest: IngestOptions::default(),
        }
    }
}
