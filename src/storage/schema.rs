//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Libraries table schema.
#[derive(Iden)]
pub enum Libraries {
    Table,
    #[iden = "name"]
    Name,
    #[iden = "is_editable"]
    IsEditable,
}

/// Items table schema: one row per item, pointing at its current version.
#[derive(Iden)]
pub enum Items {
    Table,
    #[iden = "entity_type"]
    EntityType,
    #[iden = "uid"]
    Uid,
    #[iden = "library_name"]
    LibraryName,
    #[iden = "current_sequence"]
    CurrentSequence,
}

/// Item versions table schema.
#[derive(Iden)]
pub enum ItemVersions {
    Table,
    #[iden = "entity_type"]
    EntityType,
    #[iden = "uid"]
    Uid,
    #[iden = "sequence"]
    Sequence,
    #[iden = "status"]
    Status,
    #[iden = "major_version"]
    MajorVersion,
    #[iden = "minor_version"]
    MinorVersion,
    #[iden = "author_id"]
    AuthorId,
    #[iden = "change_description"]
    ChangeDescription,
    #[iden = "start_date"]
    StartDate,
    #[iden = "end_date"]
    EndDate,
    #[iden = "value_data"]
    ValueData,
}

/// Unique values table schema.
#[derive(Iden)]
pub enum UniqueValues {
    Table,
    #[iden = "entity_type"]
    EntityType,
    #[iden = "property"]
    Property,
    #[iden = "value"]
    Value,
    #[iden = "uid"]
    Uid,
}

/// Audit trail table schema.
#[derive(Iden)]
pub enum AuditTrail {
    Table,
    #[iden = "entity_type"]
    EntityType,
    #[iden = "uid"]
    Uid,
    #[iden = "action"]
    Action,
    #[iden = "author_id"]
    AuthorId,
    #[iden = "timestamp"]
    Timestamp,
    #[iden = "before_sequence"]
    BeforeSequence,
    #[iden = "after_sequence"]
    AfterSequence,
}

/// Uid counters table schema.
#[derive(Iden)]
pub enum UidCounters {
    Table,
    #[iden = "name"]
    Name,
    #[iden = "value"]
    Value,
}

/// SQL statements creating the schema, executed in order.
pub const CREATE_TABLES: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS libraries (
    name TEXT PRIMARY KEY,
    is_editable INTEGER NOT NULL
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS items (
    entity_type TEXT NOT NULL,
    uid TEXT NOT NULL,
    library_name TEXT NOT NULL,
    current_sequence INTEGER NOT NULL,
    PRIMARY KEY (entity_type, uid)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS item_versions (
    entity_type TEXT NOT NULL,
    uid TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    status TEXT NOT NULL,
    major_version INTEGER NOT NULL,
    minor_version INTEGER NOT NULL,
    author_id TEXT NOT NULL,
    change_description TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    value_data TEXT NOT NULL,
    PRIMARY KEY (entity_type, uid, sequence)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS unique_values (
    entity_type TEXT NOT NULL,
    property TEXT NOT NULL,
    value TEXT NOT NULL,
    uid TEXT NOT NULL,
    PRIMARY KEY (entity_type, property, value)
)
"#,
    "CREATE INDEX IF NOT EXISTS idx_unique_values_uid ON unique_values(entity_type, uid)",
    r#"
CREATE TABLE IF NOT EXISTS audit_trail (
    entity_type TEXT NOT NULL,
    uid TEXT NOT NULL,
    action TEXT NOT NULL,
    author_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    before_sequence INTEGER,
    after_sequence INTEGER NOT NULL,
    PRIMARY KEY (entity_type, uid, after_sequence)
)
"#,
    r#"
CREATE TABLE IF NOT EXISTS uid_counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
)
"#,
];
