//! SQLite connection setup and the read slot pool.

pub mod pragmas;
pub mod read_pool;

pub use read_pool::{ReadPool, ReadSlot};
