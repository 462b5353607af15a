//! Durable session state: what was playing, where, and how.
//!
//! [`SessionStore`] is the storage seam; [`TomlFileStore`] keeps one TOML
//! record on disk. [`Persister`] applies writes on a background thread in
//! submission order so callers never wait on I/O.

mod file;
#[cfg(test)]
mod memory;
mod model;
mod persister;

pub use file::TomlFileStore;
#[cfg(test)]
pub use memory::{MemoryStore, StoreOp};
pub use model::*;
pub use persister::Persister;
