//! Persistence layer: libSQL-backed storage for conversation memory.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, FieldUpdate, MemoryRecord, MemoryUpdate};
