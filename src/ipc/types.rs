use std::path::PathBuf;

use crate::alpha::AlphaIndexCache;
use rusqlite::Connection;
use serde::Deserialize;

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
    pub alpha_cache: AlphaIndexCache,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            alpha_cache: AlphaIndexCache::default(),
        }
    }
}
