//! Database module: SQL repository over the alerts/listings/chats schema.
//!
//! Domain entities live in `crate::model`; this module only maps rows and
//! owns the SQL. External modules import from `tg_marketwatch::db`.

pub mod repo;

pub use repo::*;
