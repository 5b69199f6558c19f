//! SQLite engine backend.

use std::fs::OpenOptions;
use std::io::ErrorKind;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};

use crate::error_handling::DbiError;
use crate::messages as msg;

use super::{
    create_sql, delete_sql, insert_sql, select_sql, update_sql, AlterAction, ColumnInfo, DbRow,
    DbValue, DbiBackend, Select,
};

pub(crate) struct SqliteBackend {
    pool: SqlitePool,
    dbname: String,
}

impl SqliteBackend {
    /// Open (creating if necessary) the database file at *dbname* and
    /// switch it to WAL mode for concurrent access.
    pub(crate) async fn connect(dbname: &str) -> Result<SqliteBackend, DbiError> {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(dbname)
        {
            Ok(_) => {}
            Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(DbiError::engine(e.to_string(), dbname)),
        }
        let pool = SqlitePool::connect(&format!("sqlite:{dbname}"))
            .await
            .map_err(|e| DbiError::engine(e.to_string(), dbname))?;
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await
            .map_err(|e| DbiError::engine(e.to_string(), dbname))?;
        Ok(SqliteBackend {
            pool,
            dbname: dbname.to_string(),
        })
    }

    fn engine_err(&self, e: sqlx::Error) -> DbiError {
        DbiError::engine(e.to_string(), &self.dbname)
    }
}

fn bind_row<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    row: &'q [DbValue],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for value in row {
        query = match value {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Int(v) => query.bind(*v),
            DbValue::Real(v) => query.bind(*v),
            DbValue::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

/// Decode a result row by the declared type of each column. SQLite's
/// affinity names are a short closed set; anything else comes back as
/// text, with blobs passed through a lossy UTF-8 conversion.
fn decode_row(row: &SqliteRow) -> Result<DbRow, sqlx::Error> {
    let mut out = Vec::with_capacity(row.columns().len());
    for idx in 0..row.columns().len() {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            out.push(DbValue::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();
        let value = match type_name.as_str() {
            "INTEGER" => DbValue::Int(row.try_get(idx)?),
            "REAL" => DbValue::Real(row.try_get(idx)?),
            "BLOB" => {
                let bytes: Vec<u8> = row.try_get(idx)?;
                DbValue::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => DbValue::Text(row.try_get(idx)?),
        };
        out.push(value);
    }
    Ok(out)
}

#[async_trait]
impl DbiBackend for SqliteBackend {
    async fn create(&self, table: &str, fields: &[&str]) -> Result<(), DbiError> {
        sqlx::query(&create_sql(table, fields))
            .execute(&self.pool)
            .await
            .map_err(|e| self.engine_err(e))?;
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), DbiError> {
        sqlx::query(&format!("DROP TABLE {table}"))
            .execute(&self.pool)
            .await
            .map_err(|e| self.engine_err(e))?;
        Ok(())
    }

    async fn alter(&self, table: &str, action: &AlterAction<'_>) -> Result<(), DbiError> {
        let sql = match action {
            // SQLite has no column ordering, so pos is ignored
            AlterAction::AddColumn { spec, .. } => {
                format!("ALTER TABLE {table} ADD COLUMN {spec}")
            }
            AlterAction::DropColumn { .. } => {
                return Err(DbiError::usage(msg::SQLITE_NO_DROPCOL));
            }
        };
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| self.engine_err(e))?;
        Ok(())
    }

    async fn insert(
        &self,
        table: &str,
        ignore: bool,
        fields: &[&str],
        rows: &[DbRow],
    ) -> Result<(), DbiError> {
        let ignore_kw = if ignore { "OR IGNORE " } else { "" };
        let sql = insert_sql(table, ignore_kw, fields);
        let mut tx = self.pool.begin().await.map_err(|e| self.engine_err(e))?;
        for row in rows {
            bind_row(sqlx::query(&sql), row)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.engine_err(e))?;
        }
        tx.commit().await.map_err(|e| self.engine_err(e))?;
        Ok(())
    }

    async fn select(&self, table: &str, query: &Select<'_>) -> Result<Vec<DbRow>, DbiError> {
        let sql = select_sql(table, query);
        let rows = bind_row(sqlx::query(&sql), query.data)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.engine_err(e))?;
        rows.iter()
            .map(|row| decode_row(row).map_err(|e| self.engine_err(e)))
            .collect()
    }

    async fn update(
        &self,
        table: &str,
        fields: &[&str],
        where_clause: &str,
        rows: &[DbRow],
    ) -> Result<(), DbiError> {
        let sql = update_sql(table, fields, where_clause);
        let mut tx = self.pool.begin().await.map_err(|e| self.engine_err(e))?;
        for row in rows {
            bind_row(sqlx::query(&sql), row)
                .execute(&mut *tx)
                .await
                .map_err(|e| self.engine_err(e))?;
        }
        tx.commit().await.map_err(|e| self.engine_err(e))?;
        Ok(())
    }

    async fn delete(
        &self,
        table: &str,
        where_clause: &str,
        data: &[DbValue],
    ) -> Result<(), DbiError> {
        let sql = delete_sql(table, where_clause);
        bind_row(sqlx::query(&sql), data)
            .execute(&self.pool)
            .await
            .map_err(|e| self.engine_err(e))?;
        Ok(())
    }

    async fn describe(&self, table: &str) -> Result<Vec<ColumnInfo>, DbiError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.engine_err(e))?;
        if rows.is_empty() {
            return Err(DbiError::engine(
                format!("no such table: {table}"),
                &self.dbname,
            ));
        }
        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get("name").map_err(|e| self.engine_err(e))?,
                    ctype: row.try_get("type").map_err(|e| self.engine_err(e))?,
                })
            })
            .collect()
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbiError> {
        let found: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| self.engine_err(e))?;
        Ok(found.is_some())
    }

    async fn table_list(&self, prefix: &str) -> Result<Vec<String>, DbiError> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name LIKE ? ESCAPE '#' ORDER BY name",
        )
        .bind(super::like_prefix(prefix))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.engine_err(e))?;
        Ok(names.into_iter().map(|(name,)| name).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
