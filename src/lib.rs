//! crawlbox: support library for an archive integrity crawler
//!
//! The crawler's plugins all need the same three things: a configuration
//! file with typed accessors, a way to tell whether the current moment
//! falls inside an operator-declared quiet window, and a uniform handle
//! on whichever database the site runs. This crate provides all three.
//!
//! # Example
//!
//! ```no_run
//! use crawlbox::{Config, DbSection, Dbi};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cfg = Config::new();
//! cfg.read("crawl.cfg")?;
//!
//! let now = chrono::Local::now().timestamp();
//! if !cfg.quiet_time(now)? {
//!     let db = Dbi::connect(&cfg, DbSection::Crawler).await?;
//!     for table in db.table_list().await? {
//!         println!("{table}");
//!     }
//!     db.close().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! The database interface requires a Tokio runtime. Use `#[tokio::main]`
//! in your application or call it from an async context.

pub mod config;
pub mod dbi;
mod error_handling;
pub mod messages;
pub mod testhelp;
pub mod util;

// Re-export public API
pub use config::{Config, QuietWindowSet, WindowRule, WindowSpec};
pub use dbi::{AlterAction, ColumnInfo, DbEngine, DbRow, DbSection, DbValue, Dbi, Select};
pub use error_handling::{ConfigError, DbiError};
