// src/registry.rs
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::processor::Processor;

/// Name to processor map owned by one queue instance.
///
/// Registering a second processor under the same name silently replaces the
/// first; registration happens once at startup so this is not contended.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn Processor>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, processor: Arc<dyn Processor>) {
        let name = processor.name().to_string();
        self.handlers.write().await.insert(name, processor);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.handlers.read().await.get(name).cloned()
    }

    pub async fn remove(&self, name: &str) -> bool {
        self.handlers.write().await.remove(name).is_some()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.handlers.read().await.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        self.handlers.read().await.keys().cloned().collect()
    }
}
