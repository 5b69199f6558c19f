use thiserror::Error;

/// Error types for configuration handling.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The requested section does not exist.
    #[error("no section '{section}' in {filename}")]
    NoSection { section: String, filename: String },

    /// The requested option does not exist in the section or in DEFAULT.
    #[error("no option '{option}' in section '{section}' of {filename}")]
    NoOption {
        section: String,
        option: String,
        filename: String,
    },

    /// The configuration text could not be parsed.
    #[error("{filename}:{line}: {msg}")]
    Parse {
        filename: String,
        line: usize,
        msg: String,
    },

    /// The configuration file could not be read from disk.
    #[error("failed to read {filename}: {detail}")]
    Read { filename: String, detail: String },

    /// A duration option's magnitude was not numeric.
    #[error("invalid time magnitude in '{0}'")]
    InvalidTimeMagnitude(String),

    /// A duration option used an unrecognized unit.
    #[error("invalid time unit '{0}'")]
    InvalidTimeUnit(String),

    /// A quiet_time token matched none of the recognized forms.
    #[error("malformed quiet time fragment '{0}'")]
    BadQuietTimeSpec(String),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DbiError {
    /// The caller passed arguments the facade rejects before touching the
    /// engine: wrong combinations, empty collections, unsupported actions.
    #[error("{0}")]
    Usage(String),

    /// A failure reported by the database engine itself, tagged with the
    /// database name so multi-database logs stay readable.
    #[error("{msg} (dbname={dbname})")]
    Engine { msg: String, dbname: String },

    /// A configuration problem discovered while connecting.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DbiError {
    /// Wrap an engine-level failure with the owning database's name.
    pub fn engine(msg: impl Into<String>, dbname: impl Into<String>) -> Self {
        DbiError::Engine {
            msg: msg.into(),
            dbname: dbname.into(),
        }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        DbiError::Usage(msg.into())
    }
}
