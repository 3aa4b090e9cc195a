use crate::core::models::publisher::Publisher;
use ahash::AHashMap;
use std::sync::Arc;

/// Publisher lookup, built from config at startup and read-only after
pub struct PublisherManager {
    publishers: AHashMap<String, Arc<Publisher>>,
}

impl PublisherManager {
    pub fn build(publishers: Vec<Publisher>) -> Self {
        Self {
            publishers: publishers
                .into_iter()
                .map(|p| (p.id.clone(), Arc::new(p)))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Publisher>> {
        self.publishers.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }
}
