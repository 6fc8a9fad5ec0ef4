//! SQLite-backed store.
//!
//! ## Tables
//!
//! - `content` - content records
//! - `rights` - rights records, one per content row (foreign key)
//! - `counters` - the id counter
//! - `schema_version` - migration bookkeeping
//!
//! A database file is owned by one process at a time: `open` takes an
//! exclusive `fs2` lock on `<db>.lock`. Queries run on the blocking pool.

use std::ffi::OsString;
use std::fs::File as StdFile;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use super::{RecordStore, StoreError};
use crate::domain::{
    ContentId, ContentRecord, ContentType, LicenseType, Principal, RightsRecord, RoyaltyPercentage,
};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content (
    content_id          INTEGER PRIMARY KEY,
    creator             TEXT NOT NULL,
    title               TEXT NOT NULL,
    description         TEXT NOT NULL,
    content_hash        TEXT NOT NULL,
    creation_timestamp  TEXT NOT NULL,
    content_type        TEXT NOT NULL,
    duration            INTEGER NOT NULL CHECK (duration >= 0),
    is_published        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS rights (
    content_id          INTEGER PRIMARY KEY REFERENCES content(content_id) ON DELETE CASCADE,
    owner               TEXT NOT NULL,
    license_type        TEXT NOT NULL,
    royalty_percentage  INTEGER NOT NULL CHECK (royalty_percentage BETWEEN 0 AND 100),
    expiration_date     TEXT
);

CREATE TABLE IF NOT EXISTS counters (
    name    TEXT PRIMARY KEY,
    value   INTEGER NOT NULL
);

INSERT OR IGNORE INTO counters (name, value) VALUES ('content_id', 0);
"#;

/// SQLite store for content and rights
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,

    /// Advisory lock on the database file (none for in-memory databases)
    _lock: Option<StdFile>,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = lock_path(path);
        let lock = StdFile::create(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path.clone()))?;

        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, Some(lock))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        debug!("Opening in-memory SQLite database");
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, lock: Option<StdFile>) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            _lock: lock,
        })
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await?
    }
}

fn lock_path(db_path: &Path) -> PathBuf {
    let mut name = OsString::from(db_path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Create tables if needed and record the schema version
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let current: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?
        .unwrap_or(0);

    if current < SCHEMA_VERSION {
        info!("Creating database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(SCHEMA)?;
        conn.execute("DELETE FROM schema_version", [])?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
    } else {
        debug!("Database schema is up to date (v{})", current);
    }

    Ok(())
}

fn sql_id(id: ContentId) -> i64 {
    id.get() as i64
}

fn sql_duration(duration: u64) -> Result<i64, StoreError> {
    i64::try_from(duration)
        .map_err(|_| StoreError::OutOfRange(format!("duration {}", duration)))
}

/// Report primary key conflicts as duplicates, everything else as is
fn insert_error(err: rusqlite::Error, id: ContentId) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Duplicate(id)
        }
        other => StoreError::Sqlite(other),
    }
}

fn parse_id(raw: i64) -> Result<ContentId, StoreError> {
    u64::try_from(raw)
        .ok()
        .and_then(ContentId::new)
        .ok_or_else(|| corrupt(format!("invalid content id {}", raw)))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("invalid timestamp {:?}: {}", raw, e)))
}

fn parse_principal(raw: String) -> Result<Principal, StoreError> {
    Principal::new(raw).map_err(corrupt)
}

fn corrupt(reason: String) -> StoreError {
    StoreError::Corrupt { line: 0, reason }
}

/// Raw column values, converted outside the rusqlite row callback
struct ContentRow {
    content_id: i64,
    creator: String,
    title: String,
    description: String,
    content_hash: String,
    creation_timestamp: String,
    content_type: String,
    duration: i64,
    is_published: bool,
}

impl ContentRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            content_id: row.get("content_id")?,
            creator: row.get("creator")?,
            title: row.get("title")?,
            description: row.get("description")?,
            content_hash: row.get("content_hash")?,
            creation_timestamp: row.get("creation_timestamp")?,
            content_type: row.get("content_type")?,
            duration: row.get("duration")?,
            is_published: row.get("is_published")?,
        })
    }

    fn into_record(self) -> Result<ContentRecord, StoreError> {
        Ok(ContentRecord {
            content_id: parse_id(self.content_id)?,
            creator: parse_principal(self.creator)?,
            title: self.title,
            description: self.description,
            content_hash: self.content_hash,
            creation_timestamp: parse_time(&self.creation_timestamp)?,
            content_type: ContentType::from(self.content_type),
            duration: u64::try_from(self.duration)
                .map_err(|_| corrupt(format!("negative duration {}", self.duration)))?,
            is_published: self.is_published,
        })
    }
}

struct RightsRow {
    content_id: i64,
    owner: String,
    license_type: String,
    royalty_percentage: u32,
    expiration_date: Option<String>,
}

impl RightsRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            content_id: row.get("content_id")?,
            owner: row.get("owner")?,
            license_type: row.get("license_type")?,
            royalty_percentage: row.get("royalty_percentage")?,
            expiration_date: row.get("expiration_date")?,
        })
    }

    fn into_record(self) -> Result<RightsRecord, StoreError> {
        Ok(RightsRecord {
            content_id: parse_id(self.content_id)?,
            owner: parse_principal(self.owner)?,
            license_type: LicenseType::from(self.license_type),
            royalty_percentage: RoyaltyPercentage::new(self.royalty_percentage).map_err(corrupt)?,
            expiration_date: self.expiration_date.as_deref().map(parse_time).transpose()?,
        })
    }
}

fn insert_content_row(conn: &Connection, content: &ContentRecord) -> Result<(), StoreError> {
    ensure_allocated(conn, content.content_id)?;
    let duration = sql_duration(content.duration)?;
    conn.execute(
        "INSERT INTO content (content_id, creator, title, description, content_hash,
             creation_timestamp, content_type, duration, is_published)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            sql_id(content.content_id),
            content.creator.as_str(),
            content.title,
            content.description,
            content.content_hash,
            content.creation_timestamp.to_rfc3339(),
            content.content_type.as_str(),
            duration,
            content.is_published,
        ],
    )
    .map_err(|e| insert_error(e, content.content_id))?;
    Ok(())
}

fn insert_rights_row(conn: &Connection, rights: &RightsRecord) -> Result<(), StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM content WHERE content_id = ?1)",
        [sql_id(rights.content_id)],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StoreError::Missing(rights.content_id));
    }

    conn.execute(
        "INSERT INTO rights (content_id, owner, license_type, royalty_percentage, expiration_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            sql_id(rights.content_id),
            rights.owner.as_str(),
            rights.license_type.as_str(),
            rights.royalty_percentage.get(),
            rights.expiration_date.map(|t| t.to_rfc3339()),
        ],
    )
    .map_err(|e| insert_error(e, rights.content_id))?;
    Ok(())
}

fn ensure_allocated(conn: &Connection, id: ContentId) -> Result<(), StoreError> {
    let last: i64 = conn.query_row(
        "SELECT value FROM counters WHERE name = 'content_id'",
        [],
        |row| row.get(0),
    )?;
    if sql_id(id) > last {
        return Err(StoreError::IdSequence {
            expected: last as u64,
            actual: id.get(),
        });
    }
    Ok(())
}

fn commit_pair(tx: Transaction<'_>, content: &ContentRecord, rights: &RightsRecord) -> Result<(), StoreError> {
    insert_content_row(&tx, content)?;
    insert_rights_row(&tx, rights)?;
    tx.commit()?;
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn allocate_id(&self) -> Result<ContentId, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE counters SET value = value + 1 WHERE name = 'content_id'",
                [],
            )?;
            let value: i64 = tx.query_row(
                "SELECT value FROM counters WHERE name = 'content_id'",
                [],
                |row| row.get(0),
            )?;
            tx.commit()?;
            parse_id(value)
        })
        .await
    }

    async fn get_content(&self, id: ContentId) -> Result<Option<ContentRecord>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM content WHERE content_id = ?1",
                [sql_id(id)],
                ContentRow::from_row,
            )
            .optional()?
            .map(ContentRow::into_record)
            .transpose()
        })
        .await
    }

    async fn get_rights(&self, id: ContentId) -> Result<Option<RightsRecord>, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT * FROM rights WHERE content_id = ?1",
                [sql_id(id)],
                RightsRow::from_row,
            )
            .optional()?
            .map(RightsRow::into_record)
            .transpose()
        })
        .await
    }

    async fn list_content(&self) -> Result<Vec<ContentRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM content ORDER BY content_id")?;
            let rows = stmt
                .query_map([], ContentRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(ContentRow::into_record).collect()
        })
        .await
    }

    async fn insert_content(&self, content: &ContentRecord) -> Result<(), StoreError> {
        let content = content.clone();
        self.with_conn(move |conn| insert_content_row(conn, &content))
            .await
    }

    async fn insert_rights(&self, rights: &RightsRecord) -> Result<(), StoreError> {
        let rights = rights.clone();
        self.with_conn(move |conn| insert_rights_row(conn, &rights))
            .await
    }

    async fn update_content(&self, content: &ContentRecord) -> Result<(), StoreError> {
        let content = content.clone();
        let duration = sql_duration(content.duration)?;
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE content SET creator = ?2, title = ?3, description = ?4, content_hash = ?5,
                     creation_timestamp = ?6, content_type = ?7, duration = ?8, is_published = ?9
                 WHERE content_id = ?1",
                params![
                    sql_id(content.content_id),
                    content.creator.as_str(),
                    content.title,
                    content.description,
                    content.content_hash,
                    content.creation_timestamp.to_rfc3339(),
                    content.content_type.as_str(),
                    duration,
                    content.is_published,
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::Missing(content.content_id));
            }
            Ok(())
        })
        .await
    }

    async fn update_rights(&self, rights: &RightsRecord) -> Result<(), StoreError> {
        let rights = rights.clone();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE rights SET owner = ?2, license_type = ?3, royalty_percentage = ?4,
                     expiration_date = ?5
                 WHERE content_id = ?1",
                params![
                    sql_id(rights.content_id),
                    rights.owner.as_str(),
                    rights.license_type.as_str(),
                    rights.royalty_percentage.get(),
                    rights.expiration_date.map(|t| t.to_rfc3339()),
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::Missing(rights.content_id));
            }
            Ok(())
        })
        .await
    }

    async fn remove_content(&self, id: ContentId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM content WHERE content_id = ?1", [sql_id(id)])?;
            if removed == 0 {
                return Err(StoreError::Missing(id));
            }
            Ok(())
        })
        .await
    }

    // Both rows go in one transaction; on error the transaction is dropped
    // and rolled back.
    async fn insert_pair(
        &self,
        content: &ContentRecord,
        rights: &RightsRecord,
    ) -> Result<(), StoreError> {
        let content = content.clone();
        let rights = rights.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            commit_pair(tx, &content, &rights)
        })
        .await
    }
}
