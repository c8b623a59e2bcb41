//! SQLite-backed implementation of [`Loader`].
//!
//! Each load call clears the connection's diagnostics area
//! (`temp.load_diagnostics`), refills it inside the same transaction as
//! the rows, and reads it back with a query once the call commits.

use std::path::Path;

use rusqlite::{ffi, params, Connection, ErrorCode, InterruptHandle};

use super::codes;
use super::coerce::{plan_row, RowPlan};
use super::schema::{Column, ColumnType, TableSchema};
use super::{LoadMode, LoadOutcome, Loader};
use crate::domain::{IngestRecord, RowRejection};
use crate::error::{EtlError, EtlResult};
use crate::warnings::{DiagnosticRow, DiagnosticsError, RawDiagnostics};

/// Connection-scoped diagnostics area
const CREATE_DIAGNOSTICS: &str = r"
CREATE TEMP TABLE IF NOT EXISTS load_diagnostics (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL,
    code INTEGER NOT NULL,
    message TEXT NOT NULL,
    row_number INTEGER
);
";

const CLEAR_DIAGNOSTICS: &str = "DELETE FROM temp.load_diagnostics";

const INSERT_DIAGNOSTIC: &str = "INSERT INTO temp.load_diagnostics (level, code, message, row_number) \
     VALUES (?1, ?2, ?3, ?4)";

const SHOW_WARNINGS: &str =
    "SELECT level, code, message, row_number FROM temp.load_diagnostics ORDER BY seq";

const TABLE_INFO: &str =
    "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid";

/// SQLite store used as the target of every action in one invocation.
///
/// Create with [`SqliteStore::open`] for a database file or
/// [`SqliteStore::in_memory`] for tests.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a database file at `path`.
    pub fn open(path: &Path) -> EtlResult<Self> {
        let conn = Connection::open(path).map_err(|e| EtlError::ConnectionLost {
            message: format!("cannot open {}: {}", path.display(), e),
        })?;
        Self::with_connection(conn)
    }

    /// In-memory database (for tests).
    pub fn in_memory() -> EtlResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| EtlError::ConnectionLost {
            message: e.to_string(),
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> EtlResult<Self> {
        conn.execute_batch(CREATE_DIAGNOSTICS)
            .map_err(|e| EtlError::ConnectionLost {
                message: e.to_string(),
            })?;
        Ok(Self { conn })
    }

    /// Run DDL or other setup SQL (environment bootstrapping).
    pub fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    /// Underlying connection, for inspection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Handle that aborts the in-flight statement from another thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.conn.get_interrupt_handle()
    }

    /// Read the diagnostics area left by the last load call.
    pub fn show_warnings(&self) -> RawDiagnostics {
        let query = || -> rusqlite::Result<Vec<DiagnosticRow>> {
            let mut stmt = self.conn.prepare(SHOW_WARNINGS)?;
            let rows = stmt.query_map([], |row| {
                Ok(DiagnosticRow {
                    level: row.get(0)?,
                    code: row.get::<_, i64>(1)? as u32,
                    message: row.get(2)?,
                    row: row.get::<_, Option<i64>>(3)?.map(|n| n as u64),
                })
            })?;
            rows.collect()
        };

        query().map_err(|e| DiagnosticsError(e.to_string()))
    }

    /// Column layout of `table`. A missing table is a load rejection.
    pub fn table_schema(&self, table: &str) -> EtlResult<TableSchema> {
        let read = || -> rusqlite::Result<Vec<(String, String, bool, bool, i64)>> {
            let mut stmt = self.conn.prepare(TABLE_INFO)?;
            let rows = stmt.query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    row.get::<_, i64>(2)? != 0,
                    row.get::<_, Option<String>>(3)?.is_some(),
                    row.get::<_, i64>(4)?,
                ))
            })?;
            rows.collect()
        };

        let rows = read().map_err(|e| fatal(e, table, 0))?;
        if rows.is_empty() {
            return Err(EtlError::LoadRejected {
                table: table.to_string(),
                row: 0,
                code: codes::NO_SUCH_TABLE,
                message: codes::no_such_table(table),
            });
        }

        let pk_columns = rows.iter().filter(|r| r.4 > 0).count();
        let columns = rows
            .into_iter()
            .map(|(name, declared, not_null, has_default, pk)| {
                let auto_increment = pk == 1
                    && pk_columns == 1
                    && declared.trim().eq_ignore_ascii_case("INTEGER");
                // The rowid alias holds any 64-bit key
                let ty = if auto_increment {
                    ColumnType::Integer {
                        min: i64::MIN,
                        max: i64::MAX,
                    }
                } else {
                    ColumnType::from_declared(&declared)
                };
                Column {
                    ty,
                    auto_increment,
                    name,
                    declared,
                    not_null,
                    has_default,
                }
            })
            .collect();

        Ok(TableSchema {
            name: table.to_string(),
            columns,
        })
    }

    /// Empty the diagnostics area outside of any load transaction.
    fn reset_diagnostics(&self, table: &str) -> EtlResult<()> {
        self.conn
            .execute(CLEAR_DIAGNOSTICS, [])
            .map(|_| ())
            .map_err(|e| fatal(e, table, 0))
    }

    fn rejected(&self, table: &str, code: u32, message: String) -> EtlResult<LoadOutcome> {
        self.reset_diagnostics(table)?;
        Ok(LoadOutcome {
            records_loaded: 0,
            raw_warnings: self.show_warnings(),
            rejected: Some(RowRejection {
                row: 1,
                code,
                message,
            }),
        })
    }
}

impl Loader for SqliteStore {
    fn bulk_load(
        &mut self,
        table: &str,
        records: &mut dyn Iterator<Item = IngestRecord>,
    ) -> EtlResult<LoadOutcome> {
        let schema = self.table_schema(table)?;
        let mut diagnostics = Vec::new();
        let mut loaded = 0u64;

        let tx = self.conn.transaction().map_err(|e| fatal(e, table, 0))?;
        tx.execute(CLEAR_DIAGNOSTICS, [])
            .map_err(|e| fatal(e, table, 0))?;

        for (idx, record) in records.enumerate() {
            let row = idx as u64 + 1;

            match plan_row(&schema, &record, row, LoadMode::Bulk, &mut diagnostics) {
                // Dropping `tx` rolls back everything this call inserted
                RowPlan::Reject { code, message } => {
                    return Err(EtlError::LoadRejected {
                        table: table.to_string(),
                        row,
                        code,
                        message,
                    })
                }
                RowPlan::Insert { columns, values } => {
                    insert_row(&tx, table, &columns, &values).map_err(|e| fatal(e, table, row))?;
                    loaded += 1;
                }
            }
        }

        write_diagnostics(&tx, &diagnostics).map_err(|e| fatal(e, table, 0))?;
        tx.commit().map_err(|e| fatal(e, table, 0))?;

        tracing::debug!(table, loaded, diagnostics = diagnostics.len(), "Bulk load committed");

        Ok(LoadOutcome {
            records_loaded: loaded,
            raw_warnings: self.show_warnings(),
            rejected: None,
        })
    }

    fn insert_one(&mut self, table: &str, record: IngestRecord) -> EtlResult<LoadOutcome> {
        let schema = self.table_schema(table)?;
        let mut diagnostics = Vec::new();

        let (columns, values) = match plan_row(&schema, &record, 1, LoadMode::Row, &mut diagnostics)
        {
            RowPlan::Reject { code, message } => return self.rejected(table, code, message),
            RowPlan::Insert { columns, values } => (columns, values),
        };

        let tx = self.conn.transaction().map_err(|e| fatal(e, table, 1))?;
        tx.execute(CLEAR_DIAGNOSTICS, [])
            .map_err(|e| fatal(e, table, 1))?;

        if let Err(err) = insert_row(&tx, table, &columns, &values) {
            drop(tx);
            return match classify(err) {
                Failure::Row { code, message } => self.rejected(table, code, message),
                Failure::Fatal(err) => Err(err),
                Failure::Unclassified(message) => Err(EtlError::LoadRejected {
                    table: table.to_string(),
                    row: 1,
                    code: codes::UNKNOWN_ERROR,
                    message,
                }),
            };
        }

        write_diagnostics(&tx, &diagnostics).map_err(|e| fatal(e, table, 1))?;
        tx.commit().map_err(|e| fatal(e, table, 1))?;

        Ok(LoadOutcome {
            records_loaded: 1,
            raw_warnings: self.show_warnings(),
            rejected: None,
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_row(
    conn: &Connection,
    table: &str,
    columns: &[String],
    values: &[rusqlite::types::Value],
) -> rusqlite::Result<usize> {
    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
    } else {
        let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            names.join(", "),
            placeholders.join(", ")
        )
    };

    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(rusqlite::params_from_iter(values.iter()))
}

fn write_diagnostics(conn: &Connection, diagnostics: &[DiagnosticRow]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(INSERT_DIAGNOSTIC)?;
    for diag in diagnostics {
        stmt.execute(params![
            diag.level,
            i64::from(diag.code),
            diag.message,
            diag.row.map(|r| r as i64)
        ])?;
    }
    Ok(())
}

/// How an engine error affects the load
enum Failure {
    /// The row is refused; other rows are unaffected
    Row { code: u32, message: String },

    /// The connection or the invocation is gone
    Fatal(EtlError),

    /// Anything else the engine raised
    Unclassified(String),
}

fn classify(err: rusqlite::Error) -> Failure {
    let (code, extended, message) = match &err {
        rusqlite::Error::SqliteFailure(e, msg) => (
            e.code,
            e.extended_code,
            msg.clone().unwrap_or_else(|| err.to_string()),
        ),
        _ => return Failure::Unclassified(err.to_string()),
    };

    match code {
        ErrorCode::ConstraintViolation => Failure::Row {
            code: match extended {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    codes::DUPLICATE_ENTRY
                }
                ffi::SQLITE_CONSTRAINT_NOTNULL => codes::COLUMN_NOT_NULL,
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => codes::FOREIGN_KEY,
                ffi::SQLITE_CONSTRAINT_CHECK => codes::CHECK_VIOLATED,
                _ => codes::UNKNOWN_ERROR,
            },
            message,
        },
        ErrorCode::OperationInterrupted => Failure::Fatal(EtlError::Interrupted),
        ErrorCode::CannotOpen
        | ErrorCode::SystemIoFailure
        | ErrorCode::DatabaseCorrupt
        | ErrorCode::NotADatabase
        | ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::ReadOnly
        | ErrorCode::DiskFull
        | ErrorCode::OutOfMemory
        | ErrorCode::PermissionDenied
        | ErrorCode::FileLockingProtocolFailed => {
            Failure::Fatal(EtlError::ConnectionLost { message })
        }
        _ => Failure::Unclassified(message),
    }
}

/// Escalate an engine error: row-level refusals become load rejections.
fn fatal(err: rusqlite::Error, table: &str, row: u64) -> EtlError {
    match classify(err) {
        Failure::Fatal(err) => err,
        Failure::Row { code, message } => EtlError::LoadRejected {
            table: table.to_string(),
            row,
            code,
            message,
        },
        Failure::Unclassified(message) => EtlError::LoadRejected {
            table: table.to_string(),
            row,
            code: codes::UNKNOWN_ERROR,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WarningLevel;
    use serde_json::{json, Map, Value};

    const DDL: &str = r"
CREATE TABLE readings (
    id INTEGER PRIMARY KEY,
    qty TINYINT NOT NULL,
    label VARCHAR(5),
    status VARCHAR(8) NOT NULL DEFAULT 'new'
);
CREATE TABLE keyed (
    code VARCHAR(4) PRIMARY KEY
);
";

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.execute_batch(DDL).unwrap();
        store
    }

    fn records(values: Vec<Value>) -> Vec<IngestRecord> {
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => IngestRecord::new(map),
                _ => IngestRecord::new(Map::new()),
            })
            .collect()
    }

    fn count(store: &SqliteStore, table: &str) -> i64 {
        store
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_schema_introspection() {
        let schema = store().table_schema("readings").unwrap();
        assert_eq!(schema.columns.len(), 4);
        assert!(schema.columns[0].auto_increment);
        assert!(schema.columns[1].not_null);
        assert!(schema.columns[3].has_default);
        assert_eq!(
            schema.columns[2].ty,
            ColumnType::Text { max_chars: Some(5) }
        );
    }

    #[test]
    fn test_missing_table() {
        let err = store().table_schema("nope").unwrap_err();
        assert!(matches!(
            err,
            EtlError::LoadRejected {
                code: codes::NO_SUCH_TABLE,
                ..
            }
        ));
    }

    #[test]
    fn test_bulk_load_commits_coerced_values() {
        let mut store = store();
        let mut rows = records(vec![
            json!({"qty": 500, "label": "much too long", "status": "ok"}),
            json!({"qty": 3, "label": "fine", "status": "ok"}),
        ])
        .into_iter();

        let outcome = store.bulk_load("readings", &mut rows).unwrap();
        assert_eq!(outcome.records_loaded, 2);

        let diags = outcome.raw_warnings.unwrap();
        let codes: Vec<_> = diags.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![codes::OUT_OF_RANGE, codes::DATA_TRUNCATED]);
        assert_eq!(diags[0].row, Some(1));

        let (qty, label): (i64, String) = store
            .connection()
            .query_row("SELECT qty, label FROM readings WHERE id = 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(qty, 127);
        assert_eq!(label, "much ");
    }

    #[test]
    fn test_rowid_keys_beyond_32_bits() {
        let mut store = store();
        let mut rows = records(vec![
            json!({"id": 3_000_000_000_i64, "qty": 1, "label": "a", "status": "s"}),
            json!({"id": 3_000_000_001_i64, "qty": 2, "label": "b", "status": "s"}),
        ])
        .into_iter();

        let outcome = store.bulk_load("readings", &mut rows).unwrap();
        assert_eq!(outcome.records_loaded, 2);
        assert!(outcome.raw_warnings.unwrap().is_empty());

        let max: i64 = store
            .connection()
            .query_row("SELECT MAX(id) FROM readings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(max, 3_000_000_001);
    }

    #[test]
    fn test_bulk_missing_not_null_column_is_rejected() {
        let mut store = store();
        let mut rows = records(vec![json!({"label": "x", "status": "s"})]).into_iter();

        let err = store.bulk_load("readings", &mut rows).unwrap_err();
        match err {
            EtlError::LoadRejected { code, message, .. } => {
                assert_eq!(code, codes::COLUMN_NOT_NULL);
                assert_eq!(message, "Column 'qty' cannot be null");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(count(&store, "readings"), 0);
    }

    #[test]
    fn test_diagnostics_area_is_per_call() {
        let mut store = store();
        let mut first = records(vec![json!({"qty": 999, "label": "a", "status": "s"})]).into_iter();
        store.bulk_load("readings", &mut first).unwrap();

        let mut second = records(vec![json!({"qty": 1, "label": "a", "status": "s"})]).into_iter();
        let outcome = store.bulk_load("readings", &mut second).unwrap();
        assert!(outcome.raw_warnings.unwrap().is_empty());
    }

    #[test]
    fn test_bulk_rejection_rolls_back_call() {
        let mut store = store();
        let mut rows = records(vec![
            json!({"qty": 1, "label": "a", "status": "s"}),
            json!({"qty": null, "label": "b", "status": "s"}),
        ])
        .into_iter();

        let err = store.bulk_load("readings", &mut rows).unwrap_err();
        match err {
            EtlError::LoadRejected { row, code, .. } => {
                assert_eq!(row, 2);
                assert_eq!(code, codes::COLUMN_NOT_NULL);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(count(&store, "readings"), 0);
    }

    #[test]
    fn test_bulk_duplicate_key_is_escalated() {
        let mut store = store();
        let mut rows = records(vec![json!({"code": "a"}), json!({"code": "a"})]).into_iter();
        let err = store.bulk_load("keyed", &mut rows).unwrap_err();
        assert!(matches!(
            err,
            EtlError::LoadRejected {
                code: codes::DUPLICATE_ENTRY,
                ..
            }
        ));
    }

    #[test]
    fn test_insert_one_rejection_does_not_poison_store() {
        let mut store = store();

        let first = store
            .insert_one("keyed", records(vec![json!({"code": "a"})]).remove(0))
            .unwrap();
        assert_eq!(first.records_loaded, 1);

        let dup = store
            .insert_one("keyed", records(vec![json!({"code": "a"})]).remove(0))
            .unwrap();
        assert_eq!(dup.records_loaded, 0);
        assert_eq!(dup.rejected.unwrap().code, codes::DUPLICATE_ENTRY);
        assert!(dup.raw_warnings.unwrap().is_empty());

        let next = store
            .insert_one("keyed", records(vec![json!({"code": "b"})]).remove(0))
            .unwrap();
        assert_eq!(next.records_loaded, 1);
        assert_eq!(count(&store, "keyed"), 2);
    }

    #[test]
    fn test_insert_one_missing_column_uses_type_default() {
        let mut store = store();
        let outcome = store
            .insert_one("readings", records(vec![json!({"label": "x"})]).remove(0))
            .unwrap();

        assert_eq!(outcome.records_loaded, 1);
        let diags = outcome.raw_warnings.unwrap();
        assert_eq!(diags[0].code, codes::NO_DEFAULT);
        assert_eq!(diags[0].level, WarningLevel::Warning.as_str());
    }

    #[test]
    fn test_show_warnings_failure_is_reported() {
        let store = store();
        store
            .execute_batch("DROP TABLE temp.load_diagnostics")
            .unwrap();
        assert!(store.show_warnings().is_err());
    }
}
