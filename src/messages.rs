//! Canonical error-message text.
//!
//! Keeping these in one place lets the dbi validation layer and the tests
//! agree on exact wording without scattering string literals around.

pub const ALTER_ADDCOL_NOTMT: &str = "On alter(), addcol must not be empty";
pub const ALTER_DROPCOL_NOTMT: &str = "On alter(), dropcol must not be empty";
pub const ALTER_INVALID_ADDCOL: &str = "Invalid addcol argument";
pub const ALTER_INVALID_DROPCOL: &str = "Invalid dropcol argument";

pub const CRIT_INCOMPLETE: &str = "Criteria are not fully specified";
pub const DATA_IGNORED: &str = "Data would be ignored";

pub const DB_CLOSED: &str = "Cannot operate on a closed database";
pub const DB_CLOSED_ALREADY: &str = "closing a closed connection";

pub const DB2_UNAVAILABLE: &str = "DB2 support is not available in this build";

pub const DBNAME_REQUIRED: &str = "A dbname is required";
pub const DBTYPE_REQUIRED: &str = "A dbtype is required";
pub const TBL_PREFIX_REQUIRED: &str = "Table prefix string (tbl_prefix) is required";

pub const QUOTED_PLACEHOLDER: &str = "Parameter placeholders should not be quoted";
pub const SQLITE_NO_DROPCOL: &str = "SQLite does not support dropping columns";
pub const WILDCARD_SELECT: &str =
    "Wildcard selects are not supported. Please supply a list of fields.";

/// "On {op}(), data must not be empty"
pub fn data_notmt(op: &str) -> String {
    format!("On {op}(), data must not be empty")
}

/// "On {op}(), fields must not be empty"
pub fn fields_notmt(op: &str) -> String {
    format!("On {op}(), fields must not be empty")
}

/// "On {op}(), table name must not be empty"
pub fn table_notmt(op: &str) -> String {
    format!("On {op}(), table name must not be empty")
}

/// "{op} not supported for DB2"
pub fn db2_unsupported(op: &str) -> String {
    format!("{op} not supported for DB2")
}
