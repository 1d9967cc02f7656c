//! SQLite LibraryItemStore implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::audit::{AuditAction, AuditRecord};
use crate::domain::LibraryVO;
use crate::storage::schema::{
    AuditTrail, ItemVersions, Items, Libraries, UidCounters, UniqueValues, CREATE_TABLES,
};
use crate::storage::{
    parse_status, parse_timestamp, ItemCommit, LibraryItemStore, Result, StorageError,
    StoredItem, VersionRecord,
};

/// SQLite implementation of LibraryItemStore.
pub struct SqliteLibraryItemStore {
    pool: SqlitePool,
}

impl SqliteLibraryItemStore {
    /// Wrap an existing pool. Call [`init`](Self::init) before use.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) a database file and its schema.
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    /// Private in-memory database.
    ///
    /// Pinned to one connection that is never recycled, since every SQLite
    /// connection to `:memory:` opens a separate database.
    pub async fn in_memory() -> Result<Self> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    /// Create tables and indexes if they do not exist.
    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_TABLES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // BEGIN IMMEDIATE acquires the write lock upfront, preventing deadlocks
    // when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
    async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(conn)
    }

    async fn finish<T>(conn: &mut SqliteConnection, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(value)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn current_sequence(
        conn: &mut SqliteConnection,
        entity_type: &str,
        uid: &str,
    ) -> Result<Option<u32>> {
        let (sql, values) = Query::select()
            .column(Items::CurrentSequence)
            .from(Items::Table)
            .and_where(Expr::col(Items::EntityType).eq(entity_type))
            .and_where(Expr::col(Items::Uid).eq(uid))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&mut *conn)
            .await?;
        match row {
            Some(row) => {
                let seq: i64 = row.try_get("current_sequence")?;
                Ok(Some(seq as u32))
            }
            None => Ok(None),
        }
    }

    /// Check the optimistic sequence against the item row.
    fn check_expected(
        entity_type: &str,
        uid: &str,
        expected: Option<u32>,
        current: Option<u32>,
    ) -> Result<()> {
        match (expected, current) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(StorageError::AlreadyExists {
                entity_type: entity_type.to_string(),
                uid: uid.to_string(),
            }),
            (Some(_), None) => Err(StorageError::NotFound {
                entity_type: entity_type.to_string(),
                uid: uid.to_string(),
            }),
            (Some(expected), Some(actual)) if expected != actual => {
                Err(StorageError::SequenceConflict { expected, actual })
            }
            _ => Ok(()),
        }
    }

    async fn apply_commit(conn: &mut SqliteConnection, commit: &ItemCommit) -> Result<()> {
        let entity_type = commit.entity_type.as_str();
        let uid = commit.uid.as_str();

        let current = Self::current_sequence(conn, entity_type, uid).await?;
        Self::check_expected(entity_type, uid, commit.expected_sequence, current)?;

        let next = commit.next_sequence();
        if commit.version.sequence != next {
            return Err(StorageError::SequenceConflict {
                expected: next,
                actual: commit.version.sequence,
            });
        }

        for unique in &commit.unique_values {
            let (sql, values) = Query::select()
                .column(UniqueValues::Uid)
                .from(UniqueValues::Table)
                .and_where(Expr::col(UniqueValues::EntityType).eq(entity_type))
                .and_where(Expr::col(UniqueValues::Property).eq(unique.property.as_str()))
                .and_where(Expr::col(UniqueValues::Value).eq(unique.value.as_str()))
                .build_sqlx(SqliteQueryBuilder);

            if let Some(row) = sqlx::query_with(&sql, values)
                .fetch_optional(&mut *conn)
                .await?
            {
                let holder: String = row.try_get("uid")?;
                if holder != uid {
                    return Err(StorageError::UniqueViolation {
                        entity_type: entity_type.to_string(),
                        property: unique.property.clone(),
                        value: unique.value.clone(),
                        existing_uid: holder,
                    });
                }
            }
        }

        match commit.expected_sequence {
            Some(previous) => {
                let (sql, values) = Query::update()
                    .table(ItemVersions::Table)
                    .value(
                        ItemVersions::EndDate,
                        commit.version.start_date.to_rfc3339(),
                    )
                    .and_where(Expr::col(ItemVersions::EntityType).eq(entity_type))
                    .and_where(Expr::col(ItemVersions::Uid).eq(uid))
                    .and_where(Expr::col(ItemVersions::Sequence).eq(i64::from(previous)))
                    .build_sqlx(SqliteQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *conn).await?;

                let (sql, values) = Query::update()
                    .table(Items::Table)
                    .value(Items::CurrentSequence, i64::from(next))
                    .and_where(Expr::col(Items::EntityType).eq(entity_type))
                    .and_where(Expr::col(Items::Uid).eq(uid))
                    .build_sqlx(SqliteQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *conn).await?;
            }
            None => {
                let (sql, values) = Query::insert()
                    .into_table(Items::Table)
                    .columns([
                        Items::EntityType,
                        Items::Uid,
                        Items::LibraryName,
                        Items::CurrentSequence,
                    ])
                    .values_panic([
                        entity_type.into(),
                        uid.into(),
                        commit.library_name.as_str().into(),
                        i64::from(next).into(),
                    ])
                    .build_sqlx(SqliteQueryBuilder);
                sqlx::query_with(&sql, values).execute(&mut *conn).await?;
            }
        }

        let version = &commit.version;
        let (sql, values) = Query::insert()
            .into_table(ItemVersions::Table)
            .columns([
                ItemVersions::EntityType,
                ItemVersions::Uid,
                ItemVersions::Sequence,
                ItemVersions::Status,
                ItemVersions::MajorVersion,
                ItemVersions::MinorVersion,
                ItemVersions::AuthorId,
                ItemVersions::ChangeDescription,
                ItemVersions::StartDate,
                ItemVersions::EndDate,
                ItemVersions::ValueData,
            ])
            .values_panic([
                entity_type.into(),
                uid.into(),
                i64::from(version.sequence).into(),
                version.status.as_str().into(),
                i64::from(version.major_version).into(),
                i64::from(version.minor_version).into(),
                version.author_id.as_str().into(),
                version.change_description.as_str().into(),
                version.start_date.to_rfc3339().into(),
                version.end_date.map(|d| d.to_rfc3339()).into(),
                serde_json::to_string(&version.value)?.into(),
            ])
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;

        Self::delete_unique_values(conn, entity_type, uid).await?;
        for unique in &commit.unique_values {
            let (sql, values) = Query::insert()
                .into_table(UniqueValues::Table)
                .columns([
                    UniqueValues::EntityType,
                    UniqueValues::Property,
                    UniqueValues::Value,
                    UniqueValues::Uid,
                ])
                .values_panic([
                    entity_type.into(),
                    unique.property.as_str().into(),
                    unique.value.as_str().into(),
                    uid.into(),
                ])
                .build_sqlx(SqliteQueryBuilder);
            sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        }

        let audit = &commit.audit;
        let (sql, values) = Query::insert()
            .into_table(AuditTrail::Table)
            .columns([
                AuditTrail::EntityType,
                AuditTrail::Uid,
                AuditTrail::Action,
                AuditTrail::AuthorId,
                AuditTrail::Timestamp,
                AuditTrail::BeforeSequence,
                AuditTrail::AfterSequence,
            ])
            .values_panic([
                entity_type.into(),
                uid.into(),
                audit.action.as_str().into(),
                audit.author_id.as_str().into(),
                audit.timestamp.to_rfc3339().into(),
                audit.before.map(i64::from).into(),
                i64::from(audit.after).into(),
            ])
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;

        Ok(())
    }

    async fn delete_unique_values(
        conn: &mut SqliteConnection,
        entity_type: &str,
        uid: &str,
    ) -> Result<()> {
        let (sql, values) = Query::delete()
            .from_table(UniqueValues::Table)
            .and_where(Expr::col(UniqueValues::EntityType).eq(entity_type))
            .and_where(Expr::col(UniqueValues::Uid).eq(uid))
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;
        Ok(())
    }

    async fn apply_delete(
        conn: &mut SqliteConnection,
        entity_type: &str,
        uid: &str,
        expected_sequence: u32,
    ) -> Result<()> {
        let current = Self::current_sequence(conn, entity_type, uid).await?;
        Self::check_expected(entity_type, uid, Some(expected_sequence), current)?;

        let (sql, values) = Query::delete()
            .from_table(ItemVersions::Table)
            .and_where(Expr::col(ItemVersions::EntityType).eq(entity_type))
            .and_where(Expr::col(ItemVersions::Uid).eq(uid))
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;

        let (sql, values) = Query::delete()
            .from_table(AuditTrail::Table)
            .and_where(Expr::col(AuditTrail::EntityType).eq(entity_type))
            .and_where(Expr::col(AuditTrail::Uid).eq(uid))
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;

        Self::delete_unique_values(conn, entity_type, uid).await?;

        let (sql, values) = Query::delete()
            .from_table(Items::Table)
            .and_where(Expr::col(Items::EntityType).eq(entity_type))
            .and_where(Expr::col(Items::Uid).eq(uid))
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;

        Ok(())
    }

    async fn increment_counter(conn: &mut SqliteConnection, name: &str) -> Result<u64> {
        let (sql, values) = Query::insert()
            .into_table(UidCounters::Table)
            .columns([UidCounters::Name, UidCounters::Value])
            .values_panic([name.into(), 1i64.into()])
            .on_conflict(
                OnConflict::column(UidCounters::Name)
                    .value(UidCounters::Value, Expr::col(UidCounters::Value).add(1))
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&mut *conn).await?;

        let (sql, values) = Query::select()
            .column(UidCounters::Value)
            .from(UidCounters::Table)
            .and_where(Expr::col(UidCounters::Name).eq(name))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_one(&mut *conn).await?;
        let value: i64 = row.try_get("value")?;
        Ok(value as u64)
    }

    fn select_version_columns(query: &mut SelectStatement) -> &mut SelectStatement {
        query.columns([
            (ItemVersions::Table, ItemVersions::Sequence),
            (ItemVersions::Table, ItemVersions::Status),
            (ItemVersions::Table, ItemVersions::MajorVersion),
            (ItemVersions::Table, ItemVersions::MinorVersion),
            (ItemVersions::Table, ItemVersions::AuthorId),
            (ItemVersions::Table, ItemVersions::ChangeDescription),
            (ItemVersions::Table, ItemVersions::StartDate),
            (ItemVersions::Table, ItemVersions::EndDate),
            (ItemVersions::Table, ItemVersions::ValueData),
        ])
    }

    fn version_from_row(row: &SqliteRow) -> Result<VersionRecord> {
        let sequence: i64 = row.try_get("sequence")?;
        let status: String = row.try_get("status")?;
        let major_version: i64 = row.try_get("major_version")?;
        let minor_version: i64 = row.try_get("minor_version")?;
        let start_date: String = row.try_get("start_date")?;
        let end_date: Option<String> = row.try_get("end_date")?;
        let value_data: String = row.try_get("value_data")?;

        Ok(VersionRecord {
            sequence: sequence as u32,
            status: parse_status(&status)?,
            major_version: major_version as u32,
            minor_version: minor_version as u32,
            author_id: row.try_get("author_id")?,
            change_description: row.try_get("change_description")?,
            start_date: parse_timestamp(&start_date)?,
            end_date: end_date.as_deref().map(parse_timestamp).transpose()?,
            value: serde_json::from_str(&value_data)?,
        })
    }

    fn audit_from_row(entity_type: &str, uid: &str, row: &SqliteRow) -> Result<AuditRecord> {
        let action: String = row.try_get("action")?;
        let timestamp: String = row.try_get("timestamp")?;
        let before: Option<i64> = row.try_get("before_sequence")?;
        let after: i64 = row.try_get("after_sequence")?;

        Ok(AuditRecord {
            action: action
                .parse::<AuditAction>()
                .map_err(StorageError::InvalidStatus)?,
            entity_type: entity_type.to_string(),
            uid: uid.to_string(),
            author_id: row.try_get("author_id")?,
            timestamp: parse_timestamp(&timestamp)?,
            before: before.map(|b| b as u32),
            after: after as u32,
        })
    }
}

#[async_trait]
impl LibraryItemStore for SqliteLibraryItemStore {
    async fn put_library(&self, library: &LibraryVO) -> Result<()> {
        let (sql, values) = Query::insert()
            .into_table(Libraries::Table)
            .columns([Libraries::Name, Libraries::IsEditable])
            .values_panic([library.name.as_str().into(), library.is_editable.into()])
            .on_conflict(
                OnConflict::column(Libraries::Name)
                    .update_column(Libraries::IsEditable)
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_library(&self, name: &str) -> Result<Option<LibraryVO>> {
        let (sql, values) = Query::select()
            .columns([Libraries::Name, Libraries::IsEditable])
            .from(Libraries::Table)
            .and_where(Expr::col(Libraries::Name).eq(name))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(LibraryVO {
                name: row.try_get("name")?,
                is_editable: row.try_get("is_editable")?,
            })),
            None => Ok(None),
        }
    }

    async fn uid_by_property(
        &self,
        entity_type: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<String>> {
        let (sql, values) = Query::select()
            .column(UniqueValues::Uid)
            .from(UniqueValues::Table)
            .and_where(Expr::col(UniqueValues::EntityType).eq(entity_type))
            .and_where(Expr::col(UniqueValues::Property).eq(property))
            .and_where(Expr::col(UniqueValues::Value).eq(value))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("uid")?)),
            None => Ok(None),
        }
    }

    async fn next_counter(&self, name: &str) -> Result<u64> {
        let mut conn = self.begin_immediate().await?;
        let result = Self::increment_counter(&mut conn, name).await;
        Self::finish(&mut conn, result).await
    }

    async fn get_current(&self, entity_type: &str, uid: &str) -> Result<Option<StoredItem>> {
        let mut query = Query::select();
        Self::select_version_columns(&mut query)
            .column((Items::Table, Items::LibraryName))
            .from(Items::Table)
            .inner_join(
                ItemVersions::Table,
                Expr::col((ItemVersions::Table, ItemVersions::EntityType))
                    .equals((Items::Table, Items::EntityType))
                    .and(
                        Expr::col((ItemVersions::Table, ItemVersions::Uid))
                            .equals((Items::Table, Items::Uid)),
                    )
                    .and(
                        Expr::col((ItemVersions::Table, ItemVersions::Sequence))
                            .equals((Items::Table, Items::CurrentSequence)),
                    ),
            )
            .and_where(Expr::col((Items::Table, Items::EntityType)).eq(entity_type))
            .and_where(Expr::col((Items::Table, Items::Uid)).eq(uid));
        let (sql, values) = query.build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(StoredItem {
                entity_type: entity_type.to_string(),
                uid: uid.to_string(),
                library_name: row.try_get("library_name")?,
                current: Self::version_from_row(&row)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_versions(&self, entity_type: &str, uid: &str) -> Result<Vec<VersionRecord>> {
        let mut query = Query::select();
        Self::select_version_columns(&mut query)
            .from(ItemVersions::Table)
            .and_where(Expr::col(ItemVersions::EntityType).eq(entity_type))
            .and_where(Expr::col(ItemVersions::Uid).eq(uid))
            .order_by(ItemVersions::Sequence, Order::Asc);
        let (sql, values) = query.build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            versions.push(Self::version_from_row(&row)?);
        }
        Ok(versions)
    }

    async fn get_audit_trail(&self, entity_type: &str, uid: &str) -> Result<Vec<AuditRecord>> {
        let (sql, values) = Query::select()
            .columns([
                AuditTrail::Action,
                AuditTrail::AuthorId,
                AuditTrail::Timestamp,
                AuditTrail::BeforeSequence,
                AuditTrail::AfterSequence,
            ])
            .from(AuditTrail::Table)
            .and_where(Expr::col(AuditTrail::EntityType).eq(entity_type))
            .and_where(Expr::col(AuditTrail::Uid).eq(uid))
            .order_by(AuditTrail::AfterSequence, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(Self::audit_from_row(entity_type, uid, &row)?);
        }
        Ok(records)
    }

    async fn list_uids(&self, entity_type: &str) -> Result<Vec<String>> {
        let (sql, values) = Query::select()
            .column(Items::Uid)
            .from(Items::Table)
            .and_where(Expr::col(Items::EntityType).eq(entity_type))
            .order_by(Items::Uid, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut uids = Vec::with_capacity(rows.len());
        for row in rows {
            uids.push(row.try_get("uid")?);
        }
        Ok(uids)
    }

    async fn commit(&self, commit: ItemCommit) -> Result<()> {
        let mut conn = self.begin_immediate().await?;
        let result = Self::apply_commit(&mut conn, &commit).await;
        let result = Self::finish(&mut conn, result).await;
        if result.is_ok() {
            debug!(
                entity_type = %commit.entity_type,
                uid = %commit.uid,
                sequence = commit.version.sequence,
                "committed item version"
            );
        }
        result
    }

    async fn delete(&self, entity_type: &str, uid: &str, expected_sequence: u32) -> Result<()> {
        let mut conn = self.begin_immediate().await?;
        let result = Self::apply_delete(&mut conn, entity_type, uid, expected_sequence).await;
        Self::finish(&mut conn, result).await
    }
}
