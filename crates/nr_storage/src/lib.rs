use std::path::Path;
use std::sync::Arc;

use nr_core::{ClientStorage, Error, Result};

pub mod backends;

pub use backends::*;

/// Builds a client storage backend by name: `memory` or `file`.
pub fn create_storage(kind: &str, path: &Path) -> Result<Arc<dyn ClientStorage>> {
    match kind {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        "file" => Ok(Arc::new(FileStorage::new(path))),
        other => Err(Error::Storage(format!("Unknown storage backend: {}", other))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::create_storage;
    pub use nr_core::ClientStorage;
}
