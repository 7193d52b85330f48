//! Item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over the `items` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Timestamps are stored as `(timestamp_secs, timestamp_nanos)` so reads
//!   reproduce the written instant exactly.
//! - Read paths reject invalid persisted state instead of masking it.
//! - `apply_changes` is all-or-nothing.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::item::{Item, ItemId, ItemRecord};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ITEMS_TABLE: &str = "items";
const REQUIRED_ITEM_COLUMNS: &[&str] = &[
    "uuid",
    "timestamp_secs",
    "timestamp_nanos",
    "created_at",
    "updated_at",
];
const ITEM_SELECT_SQL: &str = "SELECT uuid, timestamp_secs, timestamp_nanos FROM items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(ItemId),
    DuplicateId(ItemId),
    InvalidData(String),
    /// Connection was handed over before migrations ran.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "item not found: {id}"),
            Self::DuplicateId(id) => write!(f, "item already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} is behind required {expected_version}; open it through db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Ordering applied to item listings by timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}

/// Query options for listing items.
///
/// Ties on equal timestamps are broken by id ascending in both orders, so
/// pagination stays stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemListQuery {
    /// Inclusive lower bound.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ItemListQuery {
    /// Returns whether `item` falls inside the query's time range.
    pub fn matches(&self, item: &Item) -> bool {
        let timestamp = item.timestamp();
        self.from.map_or(true, |from| timestamp >= from)
            && self.until.map_or(true, |until| timestamp < until)
    }

    /// Orders two records the same way `list_items` does.
    pub fn compare(&self, left: &ItemRecord, right: &ItemRecord) -> Ordering {
        let by_time = left.timestamp().cmp(&right.timestamp());
        let by_time = match self.order {
            SortOrder::Ascending => by_time,
            SortOrder::Descending => by_time.reverse(),
        };
        by_time.then_with(|| left.id.cmp(&right.id))
    }

    /// Same range and order with pagination removed.
    pub fn unpaged(&self) -> Self {
        Self {
            limit: None,
            offset: 0,
            ..*self
        }
    }

    /// Applies `offset` and `limit` to an already ordered sequence.
    pub fn paginate<T>(&self, ordered: Vec<T>) -> Vec<T> {
        let skipped = ordered.into_iter().skip(self.offset as usize);
        match self.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        }
    }
}

/// One staged mutation flushed by `ItemRepository::apply_changes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemChange<'a> {
    Insert(ItemId, &'a Item),
    Update(ItemId, &'a Item),
    Delete(ItemId),
}

/// Repository interface for item CRUD operations.
pub trait ItemRepository {
    fn insert_item(&self, id: ItemId, item: &Item) -> RepoResult<()>;
    fn update_item(&self, id: ItemId, item: &Item) -> RepoResult<()>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<ItemRecord>>;
    /// Counts rows in the query's range, ignoring pagination.
    fn count_items(&self, query: &ItemListQuery) -> RepoResult<u64>;
    fn delete_item(&self, id: ItemId) -> RepoResult<()>;
    /// Applies every change or none of them.
    fn apply_changes(&self, changes: &[ItemChange<'_>]) -> RepoResult<()>;
}

/// SQLite-backed item repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not run.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not have the expected shape.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(conn)?;
        Ok(Self { conn })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn insert_item(&self, id: ItemId, item: &Item) -> RepoResult<()> {
        insert_row(self.conn, id, item)
    }

    fn update_item(&self, id: ItemId, item: &Item) -> RepoResult<()> {
        update_row(self.conn, id, item)
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?.item));
        }

        Ok(None)
    }

    fn list_items(&self, query: &ItemListQuery) -> RepoResult<Vec<ItemRecord>> {
        let (mut sql, mut bind_values) = range_clause(ITEM_SELECT_SQL, query);

        match query.order {
            SortOrder::Ascending => {
                sql.push_str(" ORDER BY timestamp_secs ASC, timestamp_nanos ASC, uuid ASC")
            }
            SortOrder::Descending => {
                sql.push_str(" ORDER BY timestamp_secs DESC, timestamp_nanos DESC, uuid ASC")
            }
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_item_row(row)?);
        }

        Ok(records)
    }

    fn count_items(&self, query: &ItemListQuery) -> RepoResult<u64> {
        let (sql, bind_values) = range_clause("SELECT COUNT(*) FROM items", query);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative item count `{count}`")))
    }

    fn delete_item(&self, id: ItemId) -> RepoResult<()> {
        delete_row(self.conn, id)
    }

    fn apply_changes(&self, changes: &[ItemChange<'_>]) -> RepoResult<()> {
        // Dropping `tx` on an early return rolls everything back.
        let tx = self.conn.unchecked_transaction()?;
        for change in changes {
            match *change {
                ItemChange::Insert(id, item) => insert_row(&tx, id, item)?,
                ItemChange::Update(id, item) => update_row(&tx, id, item)?,
                ItemChange::Delete(id) => delete_row(&tx, id)?,
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn ensure_schema(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    if actual_version > expected_version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: actual_version,
            latest_supported: expected_version,
        }
        .into());
    }

    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [ITEMS_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Err(RepoError::MissingRequiredTable(ITEMS_TABLE));
    }

    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let columns = stmt
        .query_map([ITEMS_TABLE], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    if let Some(column) = REQUIRED_ITEM_COLUMNS
        .iter()
        .copied()
        .find(|column| !columns.contains(*column))
    {
        return Err(RepoError::MissingRequiredColumn {
            table: ITEMS_TABLE,
            column,
        });
    }

    Ok(())
}

fn range_clause(select: &str, query: &ItemListQuery) -> (String, Vec<Value>) {
    let mut sql = format!("{select} WHERE 1 = 1");
    let mut bind_values = Vec::new();

    if let Some(from) = query.from {
        let (secs, nanos) = encode_timestamp(from);
        sql.push_str(" AND (timestamp_secs, timestamp_nanos) >= (?, ?)");
        bind_values.push(Value::Integer(secs));
        bind_values.push(Value::Integer(nanos));
    }
    if let Some(until) = query.until {
        let (secs, nanos) = encode_timestamp(until);
        sql.push_str(" AND (timestamp_secs, timestamp_nanos) < (?, ?)");
        bind_values.push(Value::Integer(secs));
        bind_values.push(Value::Integer(nanos));
    }

    (sql, bind_values)
}

fn insert_row(conn: &Connection, id: ItemId, item: &Item) -> RepoResult<()> {
    let (secs, nanos) = encode_timestamp(item.timestamp());
    let result = conn.execute(
        "INSERT INTO items (uuid, timestamp_secs, timestamp_nanos) VALUES (?1, ?2, ?3);",
        params![id.to_string(), secs, nanos],
    );

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(RepoError::DuplicateId(id))
        }
        Err(err) => Err(err.into()),
    }
}

fn update_row(conn: &Connection, id: ItemId, item: &Item) -> RepoResult<()> {
    let (secs, nanos) = encode_timestamp(item.timestamp());
    let changed = conn.execute(
        "UPDATE items
         SET
            timestamp_secs = ?1,
            timestamp_nanos = ?2,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?3;",
        params![secs, nanos, id.to_string()],
    )?;

    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }

    Ok(())
}

fn delete_row(conn: &Connection, id: ItemId) -> RepoResult<()> {
    let changed = conn.execute("DELETE FROM items WHERE uuid = ?1;", [id.to_string()])?;

    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }

    Ok(())
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<ItemRecord> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in items.uuid"))
    })?;

    let secs: i64 = row.get("timestamp_secs")?;
    let nanos: i64 = row.get("timestamp_nanos")?;
    let timestamp = decode_timestamp(secs, nanos).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "timestamp ({secs}s, {nanos}ns) for item {id} is out of range"
        ))
    })?;

    Ok(ItemRecord::new(id, Item::new(timestamp)))
}

// Leap seconds carry nanos in 1e9..2e9; both columns round-trip them.
fn encode_timestamp(timestamp: DateTime<Utc>) -> (i64, i64) {
    (
        timestamp.timestamp(),
        i64::from(timestamp.timestamp_subsec_nanos()),
    )
}

fn decode_timestamp(secs: i64, nanos: i64) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(nanos).ok()?;
    DateTime::from_timestamp(secs, nanos)
}
