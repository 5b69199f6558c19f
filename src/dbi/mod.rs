//! Uniform database interface.
//!
//! `Dbi` gives the crawler one surface over whichever engine the
//! configuration names: embedded SQLite, networked MySQL, or the legacy
//! DB2 warehouse. Callers speak in table names, field lists and `?`
//! placeholders; the facade validates arguments, applies the configured
//! table prefix, and hands the work to the engine backend. Validation
//! failures use the same wording on every engine so callers can match on
//! message text regardless of what the config points at.

mod db2;
mod mysql;
mod sqlite;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::debug;
use strum_macros::{Display, EnumString};

use crate::config::Config;
use crate::error_handling::DbiError;
use crate::messages as msg;

/// Database engines the configuration may name in `dbtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum DbEngine {
    #[strum(serialize = "sqlite")]
    Sqlite,
    #[strum(serialize = "mysql")]
    Mysql,
    #[strum(serialize = "db2")]
    Db2,
}

/// Which configuration section supplies the connection details.
#[derive(Debug, Clone, Copy)]
pub enum DbSection<'a> {
    /// The crawler's own database, section `dbi-crawler`.
    Crawler,
    /// An HPSS metadata database, section `dbi-hpss`. The named option
    /// holds the real database name on the server.
    Hpss { dbname: &'a str },
}

/// A single value travelling into or out of the database.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Int(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Real(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

/// One row of values, in field order.
pub type DbRow = Vec<DbValue>;

/// A column as reported by `describe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub ctype: String,
}

/// Arguments for `Dbi::select`. Empty strings mean "no clause"; the
/// `Default` impl leaves every clause off.
#[derive(Debug, Default)]
pub struct Select<'a> {
    pub table: &'a str,
    pub fields: &'a [&'a str],
    pub where_clause: &'a str,
    pub data: &'a [DbValue],
    pub groupby: &'a str,
    pub orderby: &'a str,
    pub limit: Option<u64>,
}

/// A schema change for `Dbi::alter`.
#[derive(Debug, Clone, Copy)]
pub enum AlterAction<'a> {
    /// Add a column. *spec* is the column definition (`size int`); *pos*
    /// optionally names the column to insert after, on engines that
    /// support column ordering.
    AddColumn { spec: &'a str, pos: Option<&'a str> },
    /// Drop the named column.
    DropColumn { name: &'a str },
}

/// The per-engine half of the interface. Backends receive table names
/// with the prefix already applied and arguments already validated.
#[async_trait]
pub(crate) trait DbiBackend: Send + Sync {
    async fn create(&self, table: &str, fields: &[&str]) -> Result<(), DbiError>;
    async fn drop_table(&self, table: &str) -> Result<(), DbiError>;
    async fn alter(&self, table: &str, action: &AlterAction<'_>) -> Result<(), DbiError>;
    async fn insert(
        &self,
        table: &str,
        ignore: bool,
        fields: &[&str],
        rows: &[DbRow],
    ) -> Result<(), DbiError>;
    async fn select(&self, table: &str, query: &Select<'_>) -> Result<Vec<DbRow>, DbiError>;
    async fn update(
        &self,
        table: &str,
        fields: &[&str],
        where_clause: &str,
        rows: &[DbRow],
    ) -> Result<(), DbiError>;
    async fn delete(
        &self,
        table: &str,
        where_clause: &str,
        data: &[DbValue],
    ) -> Result<(), DbiError>;
    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, DbiError>;
    async fn table_exists(&self, table: &str) -> Result<bool, DbiError>;
    async fn table_list(&self, prefix: &str) -> Result<Vec<String>, DbiError>;
    async fn close(&self);
}

/// The uniform database handle.
pub struct Dbi {
    backend: Box<dyn DbiBackend>,
    engine: DbEngine,
    dbname: String,
    prefix: String,
    closed: AtomicBool,
}

// the backend trait object has no Debug of its own
impl fmt::Debug for Dbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dbi")
            .field("engine", &self.engine)
            .field("dbname", &self.dbname)
            .field("prefix", &self.prefix)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Dbi {
    /// Open the database a configuration section describes.
    pub async fn connect(cfg: &Config, section: DbSection<'_>) -> Result<Dbi, DbiError> {
        let (section_name, dbname_option) = match section {
            DbSection::Crawler => ("dbi-crawler", "dbname"),
            DbSection::Hpss { dbname } => ("dbi-hpss", dbname),
        };
        let dbtype = cfg
            .get(section_name, "dbtype")
            .map_err(|_| DbiError::usage(msg::DBTYPE_REQUIRED))?;
        let engine = DbEngine::from_str(dbtype)
            .map_err(|_| DbiError::usage(format!("Unrecognized database type: {dbtype}")))?;
        let dbname = cfg
            .get(section_name, dbname_option)
            .map_err(|_| DbiError::usage(msg::DBNAME_REQUIRED))?
            .to_string();
        let prefix_raw = cfg
            .get(section_name, "tbl_prefix")
            .map_err(|_| DbiError::usage(msg::TBL_PREFIX_REQUIRED))?;
        let prefix = normalize_prefix(prefix_raw);

        let backend: Box<dyn DbiBackend> = match engine {
            DbEngine::Sqlite => Box::new(sqlite::SqliteBackend::connect(&dbname).await?),
            DbEngine::Mysql => {
                let hostname = cfg.get_d(section_name, "hostname", "localhost");
                let username = cfg.get_d(section_name, "username", "");
                let password = cfg.get_d(section_name, "password", "");
                Box::new(mysql::MysqlBackend::connect(hostname, username, password, &dbname).await?)
            }
            DbEngine::Db2 => db2::connect(&dbname)?,
        };
        debug!("opened {engine} database {dbname} (prefix {prefix})");
        Ok(Dbi {
            backend,
            engine,
            dbname,
            prefix,
            closed: AtomicBool::new(false),
        })
    }

    pub fn engine(&self) -> DbEngine {
        self.engine
    }

    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    /// Apply the connection's table prefix to a bare table name. Already
    /// prefixed names pass through; a leading `@` escapes prefixing for
    /// tables outside the crawler's namespace.
    pub fn prefixed(&self, table: &str) -> String {
        apply_prefix(&self.prefix, table)
    }

    pub async fn create(&self, table: &str, fields: &[&str]) -> Result<(), DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("create")));
        }
        if fields.is_empty() {
            return Err(DbiError::usage(msg::fields_notmt("create")));
        }
        self.backend.create(&self.prefixed(table), fields).await
    }

    pub async fn drop(&self, table: &str) -> Result<(), DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("drop")));
        }
        self.backend.drop_table(&self.prefixed(table)).await
    }

    pub async fn alter(&self, table: &str, action: AlterAction<'_>) -> Result<(), DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("alter")));
        }
        match action {
            AlterAction::AddColumn { spec, .. } => {
                if spec.is_empty() {
                    return Err(DbiError::usage(msg::ALTER_ADDCOL_NOTMT));
                }
                if has_sql_metachars(spec) {
                    return Err(DbiError::usage(msg::ALTER_INVALID_ADDCOL));
                }
            }
            AlterAction::DropColumn { name } => {
                if name.is_empty() {
                    return Err(DbiError::usage(msg::ALTER_DROPCOL_NOTMT));
                }
                if has_sql_metachars(name) {
                    return Err(DbiError::usage(msg::ALTER_INVALID_DROPCOL));
                }
            }
        }
        self.backend.alter(&self.prefixed(table), &action).await
    }

    pub async fn insert(
        &self,
        table: &str,
        ignore: bool,
        fields: &[&str],
        rows: &[DbRow],
    ) -> Result<(), DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("insert")));
        }
        if fields.is_empty() {
            return Err(DbiError::usage(msg::fields_notmt("insert")));
        }
        if rows.is_empty() {
            return Err(DbiError::usage(msg::data_notmt("insert")));
        }
        self.backend
            .insert(&self.prefixed(table), ignore, fields, rows)
            .await
    }

    pub async fn select(&self, query: &Select<'_>) -> Result<Vec<DbRow>, DbiError> {
        self.ensure_open()?;
        if query.table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("select")));
        }
        if query.fields.is_empty() {
            return Err(DbiError::usage(msg::WILDCARD_SELECT));
        }
        check_criteria(query.where_clause, query.data)?;
        self.backend.select(&self.prefixed(query.table), query).await
    }

    pub async fn update(
        &self,
        table: &str,
        fields: &[&str],
        where_clause: &str,
        rows: &[DbRow],
    ) -> Result<(), DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("update")));
        }
        if fields.is_empty() {
            return Err(DbiError::usage(msg::fields_notmt("update")));
        }
        if rows.is_empty() {
            return Err(DbiError::usage(msg::data_notmt("update")));
        }
        if has_quoted_placeholder(where_clause) {
            return Err(DbiError::usage(msg::QUOTED_PLACEHOLDER));
        }
        self.backend
            .update(&self.prefixed(table), fields, where_clause, rows)
            .await
    }

    pub async fn delete(
        &self,
        table: &str,
        where_clause: &str,
        data: &[DbValue],
    ) -> Result<(), DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("delete")));
        }
        check_criteria(where_clause, data)?;
        self.backend
            .delete(&self.prefixed(table), where_clause, data)
            .await
    }

    pub async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("describe")));
        }
        self.backend.describe(&self.prefixed(table)).await
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbiError> {
        self.ensure_open()?;
        if table.is_empty() {
            return Err(DbiError::usage(msg::table_notmt("table_exists")));
        }
        self.backend.table_exists(&self.prefixed(table)).await
    }

    /// Names of tables in the connection's prefix namespace.
    pub async fn table_list(&self) -> Result<Vec<String>, DbiError> {
        self.ensure_open()?;
        self.backend.table_list(&self.prefix).await
    }

    /// Release the connection. Further operations fail, and closing a
    /// second time is an error in its own right.
    pub async fn close(&self) -> Result<(), DbiError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DbiError::engine(msg::DB_CLOSED_ALREADY, &self.dbname));
        }
        self.backend.close().await;
        debug!("closed database {}", self.dbname);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DbiError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbiError::engine(msg::DB_CLOSED, &self.dbname));
        }
        Ok(())
    }
}

/// A where clause with `?` placeholders needs data to fill them, and
/// data without placeholders would be silently dropped by the engine.
fn check_criteria(where_clause: &str, data: &[DbValue]) -> Result<(), DbiError> {
    let has_placeholder = where_clause.contains('?');
    if has_placeholder && data.is_empty() {
        return Err(DbiError::usage(msg::CRIT_INCOMPLETE));
    }
    if !has_placeholder && !data.is_empty() {
        return Err(DbiError::usage(msg::DATA_IGNORED));
    }
    Ok(())
}

fn has_quoted_placeholder(text: &str) -> bool {
    text.contains("'?'") || text.contains("\"?\"")
}

/// Column specs in ALTER come from config-driven schema migration code,
/// not from bound parameters, so screen them for statement-splicing text.
fn has_sql_metachars(text: &str) -> bool {
    text.contains(';') || text.contains('\'') || text.contains('"')
}

fn normalize_prefix(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    format!("{}_", raw.trim_end_matches('_'))
}

fn apply_prefix(prefix: &str, table: &str) -> String {
    if let Some(bare) = table.strip_prefix('@') {
        bare.to_string()
    } else if table.starts_with(prefix) {
        table.to_string()
    } else {
        format!("{prefix}{table}")
    }
}

/// LIKE pattern matching names that start with *prefix* literally. The
/// normalized prefix ends in `_`, which LIKE would otherwise treat as a
/// single-character wildcard; `#` is the escape character in the queries
/// that use this pattern.
pub(crate) fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('#', "##")
        .replace('_', "#_")
        .replace('%', "#%");
    format!("{escaped}%")
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn select_sql(table: &str, query: &Select<'_>) -> String {
    let mut sql = format!("SELECT {} FROM {}", query.fields.join(", "), table);
    if !query.where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(query.where_clause);
    }
    if !query.groupby.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(query.groupby);
    }
    if !query.orderby.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(query.orderby);
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    sql
}

pub(crate) fn insert_sql(table: &str, ignore_kw: &str, fields: &[&str]) -> String {
    format!(
        "INSERT {}INTO {}({}) VALUES ({})",
        ignore_kw,
        table,
        fields.join(", "),
        placeholders(fields.len())
    )
}

pub(crate) fn update_sql(table: &str, fields: &[&str], where_clause: &str) -> String {
    let assignments: Vec<String> = fields.iter().map(|f| format!("{f} = ?")).collect();
    let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}

pub(crate) fn delete_sql(table: &str, where_clause: &str) -> String {
    let mut sql = format!("DELETE FROM {table}");
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    sql
}

pub(crate) fn create_sql(table: &str, fields: &[&str]) -> String {
    format!("CREATE TABLE {}({})", table, fields.join(", "))
}
