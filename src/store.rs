use crate::model::{normalize_catalog, Catalog};
use crate::schedule::ScheduleMapping;
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};
use std::path::Path;
use thiserror::Error;

pub const DB_FILE_NAME: &str = "walkclass.sqlite3";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failed: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Set(String, String),
    Remove(String),
}

/// Minimal string key-value store the timetable persists into.
pub trait KvStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Applies a batch. Backends that can should make it all-or-nothing.
    fn apply(&self, ops: &[KvOp]) -> StoreResult<()> {
        for op in ops {
            match op {
                KvOp::Set(k, v) => self.set(k, v)?,
                KvOp::Remove(k) => self.remove(k)?,
            }
        }
        Ok(())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace).with_context(|| {
            format!("failed to create workspace {}", workspace.to_string_lossy())
        })?;
        let db_path = workspace.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv(
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )
        .context("failed to create kv table")?;
        Ok(Self { conn })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A read-only, full or locked database is unavailable, not broken.
fn write_error(e: rusqlite::Error) -> StoreError {
    use rusqlite::ErrorCode;
    match e.sqlite_error_code() {
        Some(ErrorCode::ReadOnly | ErrorCode::DiskFull | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Backend(e),
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |r| r.get(0))
            .optional()?)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv(key, value, updated_at) VALUES(?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now_millis()],
        )
        .map_err(write_error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?", [key])
            .map_err(write_error)?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn apply(&self, ops: &[KvOp]) -> StoreResult<()> {
        let tx = self.conn.unchecked_transaction().map_err(write_error)?;
        for op in ops {
            match op {
                KvOp::Set(k, v) => {
                    tx.execute(
                        "INSERT INTO kv(key, value, updated_at) VALUES(?, ?, ?)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                        params![k, v, now_millis()],
                    )
                    .map_err(write_error)?;
                }
                KvOp::Remove(k) => {
                    tx.execute("DELETE FROM kv WHERE key = ?", [k])
                        .map_err(write_error)?;
                }
            }
        }
        tx.commit().map_err(write_error)?;
        Ok(())
    }
}

/// Key layout under one application namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    app_id: String,
}

impl Keys {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }

    pub fn config(&self) -> String {
        format!("walkclass_config_{}", self.app_id)
    }

    pub fn week_prefix(&self) -> String {
        format!("walkclass_schedule_{}_", self.app_id)
    }

    pub fn week(&self, week_start: &str) -> String {
        format!("{}{}", self.week_prefix(), week_start)
    }

    pub fn last_date(&self) -> String {
        format!("walkclass_last_date_{}", self.app_id)
    }
}

fn parse_json(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(raw).ok().filter(|v| v.is_object())
}

/// Global config, or `None` when absent or unreadable.
pub fn load_config(store: &dyn KvStore, keys: &Keys) -> StoreResult<Option<Catalog>> {
    let raw = store.get(&keys.config())?;
    Ok(raw.as_deref().and_then(parse_json).map(|v| normalize_catalog(&v)))
}

pub fn config_doc(catalog: &Catalog, updated_at: i64) -> StoreResult<String> {
    let mut v = serde_json::to_value(catalog)?;
    v["updatedAt"] = json!(updated_at);
    Ok(serde_json::to_string(&v)?)
}

/// A week's mapping. Understands the wrapped `{schedule, updatedAt}` document
/// as well as a bare mapping stored directly.
pub fn load_week(store: &dyn KvStore, keys: &Keys, week_start: &str) -> StoreResult<Option<ScheduleMapping>> {
    let raw = store.get(&keys.week(week_start))?;
    Ok(raw.as_deref().and_then(parse_week_doc).map(|(m, _)| m))
}

/// Returns the mapping and its `updatedAt` (0 when missing).
pub fn parse_week_doc(raw: &str) -> Option<(ScheduleMapping, i64)> {
    let v: Value = serde_json::from_str(raw).ok()?;
    if !(v.is_object() || v.is_array()) {
        return None;
    }
    let updated_at = v.get("updatedAt").and_then(|x| x.as_i64()).unwrap_or(0);
    let mapping = match v.get("schedule") {
        Some(s) => ScheduleMapping::from_json_lenient(s),
        None => ScheduleMapping::from_json_lenient(&v),
    };
    Some((mapping, updated_at))
}

pub fn week_doc(mapping: &ScheduleMapping, updated_at: i64) -> StoreResult<String> {
    Ok(serde_json::to_string(&json!({
        "schedule": mapping,
        "updatedAt": updated_at,
    }))?)
}

pub fn load_last_date(store: &dyn KvStore, keys: &Keys) -> StoreResult<String> {
    Ok(store.get(&keys.last_date())?.unwrap_or_default())
}

pub fn save_last_date(store: &dyn KvStore, keys: &Keys, ymd: &str) -> StoreResult<()> {
    store.set(&keys.last_date(), ymd)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScheduleUnit, Teacher};
    use crate::timegrid::{CellKey, Day};

    #[test]
    fn sqlite_store_roundtrips_and_filters_by_prefix() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.set("a_1", "x").expect("set");
        store.set("a_2", "y").expect("set");
        store.set("b_1", "z").expect("set");
        store.set("a_1", "x2").expect("overwrite");
        assert_eq!(store.get("a_1").expect("get").as_deref(), Some("x2"));
        assert_eq!(store.keys_with_prefix("a_").expect("keys"), vec!["a_1", "a_2"]);

        store
            .apply(&[KvOp::Remove("a_2".into()), KvOp::Set("c".into(), "w".into())])
            .expect("batch");
        assert!(store.get("a_2").expect("get").is_none());
        assert_eq!(store.get("c").expect("get").as_deref(), Some("w"));
    }

    #[test]
    fn read_only_database_reports_unavailable() {
        let dir = std::env::temp_dir().join(format!("walkclassd-ro-{}", uuid::Uuid::new_v4()));
        let store = SqliteStore::open(&dir).expect("open");
        store.set("k", "v").expect("set");
        drop(store);

        let conn = Connection::open_with_flags(dir.join(DB_FILE_NAME), rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
            .expect("open read-only");
        let ro = SqliteStore { conn };
        assert_eq!(ro.get("k").expect("get").as_deref(), Some("v"));
        let err = ro.set("k", "w").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{err:?}");
        let err = ro.apply(&[KvOp::Remove("k".into())]).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{err:?}");
        drop(ro);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn prefix_match_is_literal() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.set("walkclass_schedule_x_2026-01-05", "{}").expect("set");
        store.set("walkclass_scheduleXx_2026", "{}").expect("set");
        assert_eq!(store.keys_with_prefix("walkclass_schedule_x_").expect("keys").len(), 1);
        assert_eq!(store.keys_with_prefix("walkclass_schedule_%").expect("keys").len(), 0);
    }

    #[test]
    fn week_and_config_documents_load_leniently() {
        let store = memory::MemoryStore::default();
        let keys = Keys::new("t");
        assert!(load_week(&store, &keys, "2026-10-19").expect("load").is_none());

        store.set(&keys.week("2026-10-19"), "{ not json").expect("set");
        assert!(load_week(&store, &keys, "2026-10-19").expect("load").is_none());

        let cell = CellKey::new("c1", Day::Fri, "p1");
        let mapping = ScheduleMapping::new().with_units(
            &cell,
            vec![ScheduleUnit { id: "u".into(), teacher_id: "t".into(), group_name: "g".into() }],
        );
        store.set(&keys.week("2026-10-19"), &week_doc(&mapping, 5).expect("doc")).expect("set");
        assert_eq!(load_week(&store, &keys, "2026-10-19").expect("load"), Some(mapping));

        store
            .set(&keys.week("2026-10-26"), r#"{"c1-mon-p1":[{"id":"u","teacherId":"t"}],"updatedAt":3}"#)
            .expect("set legacy");
        let legacy = load_week(&store, &keys, "2026-10-26").expect("load").expect("some");
        assert_eq!(legacy.unit_count(), 1);

        let catalog = Catalog {
            teachers: vec![Teacher { id: "t".into(), name: "T".into(), subject: "S".into() }],
            ..Default::default()
        };
        store.set(&keys.config(), &config_doc(&catalog, 9).expect("doc")).expect("set");
        assert_eq!(load_config(&store, &keys).expect("load"), Some(catalog));
        store.set(&keys.config(), "[]").expect("set");
        assert_eq!(load_config(&store, &keys).expect("load"), None);
    }
}
