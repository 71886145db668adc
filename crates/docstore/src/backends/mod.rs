//! Document store backends

pub mod memory;
pub mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;
