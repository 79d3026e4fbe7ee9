//! SQL text for the session table.
//!
//! Table and column names come from operator configuration and are
//! spliced into statement text. [`quote_ident`] is the only place that
//! happens; every statement is built once by [`Statements::new`].

use crate::config::SchemaOptions;
use crate::domain::MAX_SESSION_ID_LEN;

/// PostgreSQL SQLSTATE for `duplicate_table`.
pub const DUPLICATE_TABLE: &str = "42P07";

/// Result of the startup `CREATE TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The table was created.
    Created,
    /// The table was already there (every restart after the first).
    AlreadyExists,
    /// Creation failed for another reason; startup continues.
    Failed,
    /// Table creation is disabled in configuration.
    Skipped,
}

/// Returns `true` if `code` is the SQLSTATE for an existing table.
#[must_use]
pub fn is_duplicate_table(code: Option<&str>) -> bool {
    code == Some(DUPLICATE_TABLE)
}

/// Quotes an identifier using PostgreSQL double-quote rules.
///
/// The name is not validated; it is trusted operator input.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Prebuilt statement text for one session table layout.
///
/// Bind parameters use PostgreSQL `$n` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    /// `CREATE TABLE` for the session table.
    pub create_table: String,
    /// Select the payload of one session. Binds: id.
    pub select_data: String,
    /// Insert or overwrite a session. Binds: id, expires, data.
    pub upsert: String,
    /// Refresh the expiry. Binds: expires, id.
    pub touch: String,
    /// Delete one session. Binds: id.
    pub destroy: String,
    /// Count all sessions.
    pub count: String,
    /// Delete all sessions.
    pub clear: String,
    /// Delete expired sessions. Binds: reference epoch seconds.
    pub delete_expired: String,
}

impl Statements {
    /// Builds every statement for the given table layout.
    #[must_use]
    pub fn new(schema: &SchemaOptions) -> Self {
        let table = quote_ident(&schema.table_name);
        let id = quote_ident(&schema.column_names.session_id);
        let expires = quote_ident(&schema.column_names.expires);
        let data = quote_ident(&schema.column_names.data);

        Self {
            create_table: format!(
                "CREATE TABLE {table} (\
                 {id} VARCHAR({MAX_SESSION_ID_LEN}) NOT NULL, \
                 {expires} BIGINT NOT NULL, \
                 {data} TEXT, \
                 PRIMARY KEY ({id}))"
            ),
            select_data: format!("SELECT {data} FROM {table} WHERE {id} = $1 LIMIT 1"),
            upsert: format!(
                "INSERT INTO {table} ({id}, {expires}, {data}) VALUES ($1, $2, $3) \
                 ON CONFLICT ({id}) DO UPDATE \
                 SET {expires} = EXCLUDED.{expires}, {data} = EXCLUDED.{data}"
            ),
            touch: format!("UPDATE {table} SET {expires} = $1 WHERE {id} = $2"),
            destroy: format!("DELETE FROM {table} WHERE {id} = $1"),
            count: format!("SELECT COUNT(*) FROM {table}"),
            clear: format!("DELETE FROM {table}"),
            delete_expired: format!("DELETE FROM {table} WHERE {expires} < $1"),
        }
    }
}
