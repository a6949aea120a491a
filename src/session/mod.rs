//! Per-user session state held in process memory.

mod locks;

pub use locks::SessionLockRegistry;
