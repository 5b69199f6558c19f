//! DB2 engine backend.
//!
//! DB2 needs a proprietary client driver that this build does not carry,
//! so the engine is recognized but never connects. The backend type
//! documents the surface DB2 would get if a driver were wired in: a
//! read-only one, since the warehouse is owned by HPSS and the crawler
//! must never write to it.

use async_trait::async_trait;

use crate::error_handling::DbiError;
use crate::messages as msg;

use super::{AlterAction, ColumnInfo, DbRow, DbValue, DbiBackend, Select};

pub(crate) fn connect(dbname: &str) -> Result<Box<dyn DbiBackend>, DbiError> {
    Err(DbiError::engine(msg::DB2_UNAVAILABLE, dbname))
}

#[allow(dead_code)]
pub(crate) struct Db2Backend {
    dbname: String,
}

#[allow(dead_code)]
impl Db2Backend {
    pub(crate) fn new(dbname: &str) -> Db2Backend {
        Db2Backend {
            dbname: dbname.to_string(),
        }
    }

    fn unavailable(&self) -> DbiError {
        DbiError::engine(msg::DB2_UNAVAILABLE, &self.dbname)
    }

    fn unsupported(&self, op: &str) -> DbiError {
        DbiError::engine(msg::db2_unsupported(op), &self.dbname)
    }
}

#[async_trait]
impl DbiBackend for Db2Backend {
    async fn create(&self, _table: &str, _fields: &[&str]) -> Result<(), DbiError> {
        Err(self.unsupported("create"))
    }

    async fn drop_table(&self, _table: &str) -> Result<(), DbiError> {
        Err(self.unsupported("drop"))
    }

    async fn alter(&self, _table: &str, _action: &AlterAction<'_>) -> Result<(), DbiError> {
        Err(self.unsupported("alter"))
    }

    async fn insert(
        &self,
        _table: &str,
        _ignore: bool,
        _fields: &[&str],
        _rows: &[DbRow],
    ) -> Result<(), DbiError> {
        Err(self.unsupported("insert"))
    }

    async fn select(&self, _table: &str, _query: &Select<'_>) -> Result<Vec<DbRow>, DbiError> {
        Err(self.unavailable())
    }

    async fn update(
        &self,
        _table: &str,
        _fields: &[&str],
        _where_clause: &str,
        _rows: &[DbRow],
    ) -> Result<(), DbiError> {
        Err(self.unsupported("update"))
    }

    async fn delete(
        &self,
        _table: &str,
        _where_clause: &str,
        _data: &[DbValue],
    ) -> Result<(), DbiError> {
        Err(self.unsupported("delete"))
    }

    async fn describe(&self, _table: &str) -> Result<Vec<ColumnInfo>, DbiError> {
        Err(self.unavailable())
    }

    async fn table_exists(&self, _table: &str) -> Result<bool, DbiError> {
        Err(self.unavailable())
    }

    async fn table_list(&self, _prefix: &str) -> Result<Vec<String>, DbiError> {
        Err(self.unavailable())
    }

    async fn close(&self) {}
}
