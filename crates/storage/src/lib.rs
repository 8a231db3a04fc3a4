#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{InMemorySessionStore, PreviewStore, SessionStore, Storage, StorageError, cmi};
