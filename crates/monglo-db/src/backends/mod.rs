//! Store backend implementations

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use memory::MemoryBackend;
#[cfg(feature = "mongodb")]
pub use mongodb::{MongoDBBackend, MongoDBBackendBuilder, MongoDBTransaction};
