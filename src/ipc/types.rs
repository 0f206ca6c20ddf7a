use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::model::Dataset;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Tables loaded from the workspace; replaced wholesale, never edited.
    pub dataset: Option<Dataset>,
}
