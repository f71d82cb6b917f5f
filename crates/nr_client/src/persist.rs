use std::sync::Arc;

use nr_core::{ClientStorage, Logger};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

/// Client storage wrapped so that every failure is logged and swallowed.
#[derive(Clone)]
pub(crate) struct Mirror {
    storage: Arc<dyn ClientStorage>,
    logger: Logger,
}

impl Mirror {
    pub(crate) fn new(storage: Arc<dyn ClientStorage>, logger: Logger) -> Self {
        Self { storage, logger }
    }

    pub(crate) fn read(&self, key: &str) -> Option<String> {
        match self.storage.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                self.logger.log_error(&e, json!({ "operation": "read", "key": key }));
                None
            }
        }
    }

    /// Reads and decodes `key`; undecodable data is logged and treated as absent.
    pub(crate) fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.logger.log_error(&e, json!({ "operation": "decode", "key": key }));
                None
            }
        }
    }

    pub(crate) fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set_item(key, value) {
            self.logger.log_error(&e, json!({ "operation": "write", "key": key }));
        }
    }

    pub(crate) fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write(key, &raw),
            Err(e) => {
                self.logger.log_error(&e, json!({ "operation": "encode", "key": key }));
            }
        }
    }

    pub(crate) fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            self.logger.log_error(&e, json!({ "operation": "remove", "key": key }));
        }
    }
}
