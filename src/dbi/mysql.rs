//! MySQL engine backend.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::{MySqlPool, Row, ValueRef};

use crate::error_handling::DbiError;

use super::{
    create_sql, delete_sql, insert_sql, select_sql, update_sql, AlterAction, ColumnInfo, DbRow,
    DbValue, DbiBackend, Select,
};

pub(crate) struct MysqlBackend {
    pool: MySqlPool,
    dbname: String,
}

impl MysqlBackend {
    /// Connect to the named database on *hostname*, which may carry an
    /// explicit `host:port`.
    pub(crate) async fn connect(
        hostname: &str,
        username: &str,
        password: &str,
        dbname: &str,
    ) -> Result<MysqlBackend, DbiError> {
        let (host, port) = match hostname.split_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| DbiError::engine(format!("bad port in '{hostname}'"), dbname))?;
                (host, Some(port))
            }
            None => (hostname, None),
        };
        let mut options = MySqlConnectOptions::new()
            .host(host)
            .username(username)
            .password(password)
            .database(dbname);
        if let Some(port) = port {
            options = options.port(port);
        }
        let pool = MySqlPoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| DbiError::engine(e.to_string(), dbname))?;
        Ok(MysqlBackend {
            pool,
            dbname: dbname.to_string(),
        })
    }

    fn engine_err(&self, e: sqlx::Error) -> DbiError {
        DbiError::engine(e.to_string(), &self.dbname)
    }
}

fn bind_row<'q>(
    mut query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    row: &'q [DbValue],
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
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

/// Decode a result row by probing: MySQL's column type names vary with
/// server version and signedness, so try the concrete decodes in order
/// instead of matching names.
fn decode_row(row: &MySqlRow) -> Result<DbRow, sqlx::Error> {
    let mut out = Vec::with_capacity(row.columns().len());
    for idx in 0..row.columns().len() {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            out.push(DbValue::Null);
            continue;
        }
        let value = if let Ok(v) = row.try_get::<i64, _>(idx) {
            DbValue::Int(v)
        } else if let Ok(v) = row.try_get::<f64, _>(idx) {
            DbValue::Real(v)
        } else if let Ok(v) = row.try_get::<String, _>(idx) {
            DbValue::Text(v)
        } else {
            let bytes: Vec<u8> = row.try_get(idx)?;
            DbValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        };
        out.push(value);
    }
    Ok(out)
}

#[async_trait]
impl DbiBackend for MysqlBackend {
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
            AlterAction::AddColumn { spec, pos } => match pos {
                Some(after) => format!("ALTER TABLE {table} ADD COLUMN {spec} AFTER {after}"),
                None => format!("ALTER TABLE {table} ADD COLUMN {spec}"),
            },
            AlterAction::DropColumn { name } => {
                format!("ALTER TABLE {table} DROP COLUMN {name}")
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
        let ignore_kw = if ignore { "IGNORE " } else { "" };
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
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
        )
        .bind(&self.dbname)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.engine_err(e))?;
        if rows.is_empty() {
            return Err(DbiError::engine(
                format!("no such table: {table}"),
                &self.dbname,
            ));
        }
        Ok(rows
            .into_iter()
            .map(|(name, ctype)| ColumnInfo { name, ctype })
            .collect())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbiError> {
        let found: Option<(String,)> = sqlx::query_as(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = ? AND table_name = ?",
        )
        .bind(&self.dbname)
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| self.engine_err(e))?;
        Ok(found.is_some())
    }

    async fn table_list(&self, prefix: &str) -> Result<Vec<String>, DbiError> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = ? AND table_name LIKE ? ESCAPE '#' ORDER BY table_name",
        )
        .bind(&self.dbname)
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
