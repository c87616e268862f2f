//! Workspace-level settings for the grades table and CSV upload.
//!
//! Stored as one JSON object under the `grades_table` settings key. Missing
//! fields take their defaults.

use crate::db;
use crate::table::{DEFAULT_PER_PAGE, PER_PAGE_OPTIONS};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const SETTINGS_KEY: &str = "grades_table";
pub const DEFAULT_MAX_CSV_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradesTableConfig {
    pub default_per_page: usize,
    pub max_csv_bytes: usize,
}

impl Default for GradesTableConfig {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_csv_bytes: DEFAULT_MAX_CSV_BYTES,
        }
    }
}

impl GradesTableConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !PER_PAGE_OPTIONS.contains(&self.default_per_page) {
            return Err(format!(
                "defaultPerPage must be one of {:?}",
                PER_PAGE_OPTIONS
            ));
        }
        if self.max_csv_bytes == 0 {
            return Err("maxCsvBytes must be > 0".to_string());
        }
        Ok(())
    }

    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        match db::settings_get_json(conn, SETTINGS_KEY)? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(Self::default()),
        }
    }

    /// Merges `patch` over the stored settings and persists the result.
    pub fn update(conn: &Connection, patch: &serde_json::Value) -> anyhow::Result<Self> {
        let mut current = serde_json::to_value(Self::load(conn)?)?;
        if let (Some(dst), Some(src)) = (current.as_object_mut(), patch.as_object()) {
            for (k, v) in src {
                dst.insert(k.clone(), v.clone());
            }
        }
        let next: Self = serde_json::from_value(current)?;
        next.validate().map_err(anyhow::Error::msg)?;
        db::settings_set_json(conn, SETTINGS_KEY, &serde_json::to_value(&next)?)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use serde_json::json;

    #[test]
    fn defaults_when_unset() {
        let conn = open_in_memory();
        assert_eq!(
            GradesTableConfig::load(&conn).expect("load"),
            GradesTableConfig::default()
        );
    }

    #[test]
    fn update_merges_and_validates() {
        let conn = open_in_memory();
        let cfg = GradesTableConfig::update(&conn, &json!({ "defaultPerPage": 50 })).expect("update");
        assert_eq!(cfg.default_per_page, 50);
        assert_eq!(cfg.max_csv_bytes, DEFAULT_MAX_CSV_BYTES);

        assert!(GradesTableConfig::update(&conn, &json!({ "defaultPerPage": 7 })).is_err());
        assert_eq!(
            GradesTableConfig::load(&conn).expect("load").default_per_page,
            50
        );
    }
}
