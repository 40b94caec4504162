//! services/api/src/adapters/mock_catalog.rs
//!
//! The `DocumentCatalog` used until a real document backend exists: generated
//! data behind an artificial delay.

use async_trait::async_trait;
use chrono::Utc;
use doc_review_core::domain::Dataset;
use doc_review_core::mock_data::{generate_dataset, DOCUMENTS_PER_STATE};
use doc_review_core::ports::{DocumentCatalog, PortResult};
use std::time::Duration;
use tracing::info;

pub struct MockCatalog {
    delay: Duration,
    per_state: usize,
}

impl MockCatalog {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            per_state: DOCUMENTS_PER_STATE,
        }
    }
}

#[async_trait]
impl DocumentCatalog for MockCatalog {
    async fn load(&self, states: &[String]) -> PortResult<Dataset> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let dataset = generate_dataset(states, self.per_state, Utc::now(), &mut rand::rng());
        info!(
            states = states.len(),
            documents = dataset.documents.len(),
            versions = dataset.versions.len(),
            pages = dataset.pages.len(),
            "Loaded mock catalogue"
        );
        Ok(dataset)
    }
}
