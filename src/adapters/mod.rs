//! Concrete adapter implementations for ports.

pub mod delimited_adapter;
pub mod file_config_adapter;
pub mod spreadsheet_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_store_adapter;
