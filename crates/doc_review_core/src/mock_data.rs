//! crates/doc_review_core/src/mock_data.rs
//!
//! Fake documents, versions, pages, and validation rules for demo and offline use.
//!
//! The shape of the output (counts derived from inputs and id formats) is fixed.
//! Statuses, timestamps, and the per-version page and rule counts come from the
//! random source passed in, so a seeded generator gives reproducible data.

use crate::domain::{Dataset, Document, DocumentStatus, Page, Role, User, ValidationRule, Version};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::json;

pub const MOCK_STATES: [&str; 5] = ["California", "Texas", "New York", "Florida", "Illinois"];
pub const DOCUMENTS_PER_STATE: usize = 3;
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

const MAX_VERSIONS_PER_DOCUMENT: u32 = 5;
const MAX_PAGES_PER_VERSION: u32 = 5;
const MAX_RULES_PER_PAGE: u32 = 3;

/// How far back `last_edited` and `created_at` may fall.
const EDIT_WINDOW_MS: i64 = 10_000_000_000;
/// How far back `updated_at` may fall.
const UPDATE_WINDOW_MS: i64 = 1_000_000_000;

pub fn mock_states() -> Vec<String> {
    MOCK_STATES.iter().map(|s| s.to_string()).collect()
}

fn random_status<R: Rng + ?Sized>(rng: &mut R) -> DocumentStatus {
    DocumentStatus::ALL[rng.random_range(0..DocumentStatus::ALL.len())]
}

fn random_past<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>, window_ms: i64) -> DateTime<Utc> {
    now - Duration::milliseconds(rng.random_range(0..window_ms))
}

/// Generates `per_state` documents for each state, in state order.
pub fn generate_documents<R: Rng + ?Sized>(
    states: &[String],
    per_state: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Document> {
    states
        .iter()
        .flat_map(|state| (0..per_state).map(move |i| (state, i)))
        .map(|(state, i)| Document {
            id: format!("doc-{}-{}", state, i),
            name: format!("{} Form {}", state, i + 1),
            state: state.clone(),
            versions_count: rng.random_range(1..=MAX_VERSIONS_PER_DOCUMENT),
            last_edited: random_past(rng, now, EDIT_WINDOW_MS),
            status: random_status(rng),
        })
        .collect()
}

/// Generates exactly `versions_count` versions for every document.
pub fn generate_versions<R: Rng + ?Sized>(
    documents: &[Document],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Version> {
    let mut versions = Vec::new();
    for doc in documents {
        for i in 0..doc.versions_count {
            versions.push(Version {
                id: format!("version-{}-{}", doc.id, i),
                document_id: doc.id.clone(),
                version_number: i + 1,
                status: random_status(rng),
                created_at: random_past(rng, now, EDIT_WINDOW_MS),
                updated_at: random_past(rng, now, UPDATE_WINDOW_MS),
            });
        }
    }
    versions
}

/// Generates one to five pages per version, each with one to three rules.
pub fn generate_pages<R: Rng + ?Sized>(versions: &[Version], rng: &mut R) -> Vec<Page> {
    let mut pages = Vec::new();
    for version in versions {
        let page_count = rng.random_range(1..=MAX_PAGES_PER_VERSION);
        for i in 0..page_count {
            let page_id = format!("page-{}-{}", version.id, i);
            let field = format!("field{}", i + 1);
            let rule_count = rng.random_range(1..=MAX_RULES_PER_PAGE);
            let validation_rules = (0..rule_count)
                .map(|j| ValidationRule {
                    id: format!("rule-{}-{}-{}", version.id, i, j),
                    page_id: page_id.clone(),
                    description: format!("Validate Field {}", i + 1),
                    field: field.clone(),
                    rule: format!("length > {}", j + 1),
                })
                .collect();

            pages.push(Page {
                id: page_id,
                version_id: version.id.clone(),
                page_number: i + 1,
                image_url: PLACEHOLDER_IMAGE.to_string(),
                json: json!({
                    "fields": [{ "name": field, "type": "text", "label": format!("Field {}", i + 1) }]
                }),
                validation_rules,
            });
        }
    }
    pages
}

/// Documents, then their versions, then their pages.
pub fn generate_dataset<R: Rng + ?Sized>(
    states: &[String],
    per_state: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Dataset {
    let documents = generate_documents(states, per_state, now, rng);
    let versions = generate_versions(&documents, now, rng);
    let pages = generate_pages(&versions, rng);
    Dataset {
        documents,
        versions,
        pages,
    }
}

/// The identity used by the demo login for `role`.
pub fn demo_user(role: Role) -> User {
    User {
        id: format!("demo-{}", role),
        email: format!("{}@example.com", role),
        name: format!("{} User", role.as_str().to_uppercase()),
        role,
        states: mock_states().into_iter().collect(),
    }
}

/// The users the admin page manages: one demo user per console role.
pub fn demo_users() -> Vec<User> {
    [Role::Cca, Role::Dev, Role::Admin]
        .into_iter()
        .map(demo_user)
        .collect()
}

/// The user loaded alongside mock data when no role is picked.
pub fn default_demo_user() -> User {
    User {
        id: "demo-user".to_string(),
        email: "user@example.com".to_string(),
        name: "John Doe".to_string(),
        role: Role::Cca,
        states: mock_states().into_iter().collect(),
    }
}
