//! crates/doc_review_core/src/store.rs
//!
//! The application state container: the single in-memory snapshot of the
//! signed-in user, the entity lists, and the current navigation selection.
//!
//! Every setter is a single wholesale assignment. Setters never validate
//! against other fields and never cascade; a selected id that disappears from
//! a replaced list is left dangling on purpose. Use [`AppStore::selection_issues`]
//! to inspect consistency without changing anything.

use crate::domain::{Dataset, Document, Page, User, Version};
use crate::ports::StorageError;
use serde::{Deserialize, Serialize};

/// Failure turning the store into its persisted form, or back.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Snapshot storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// One entry of the navigation trail shown above every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    pub path: String,
    pub active: bool,
}

/// A selected id that does not line up with the loaded entities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionIssue {
    #[error("Selected state '{0}' is not loaded")]
    UnknownState(String),
    #[error("Selected document '{0}' is not loaded")]
    UnknownDocument(String),
    #[error("Selected version '{0}' is not loaded")]
    UnknownVersion(String),
    #[error("Selected page '{0}' is not loaded")]
    UnknownPage(String),
    #[error("Document '{document}' is not in state '{state}'")]
    DocumentOutsideState { document: String, state: String },
    #[error("Version '{version}' does not belong to document '{document}'")]
    VersionOutsideDocument { version: String, document: String },
    #[error("Page '{page}' does not belong to version '{version}'")]
    PageOutsideVersion { page: String, version: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppStore {
    user: Option<User>,
    states: Vec<String>,
    documents: Vec<Document>,
    versions: Vec<Version>,
    pages: Vec<Page>,
    current_state: Option<String>,
    current_document: Option<String>,
    current_version: Option<String>,
    current_page: Option<String>,
    is_loading: bool,
    error: Option<String>,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Setters ---

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    pub fn set_states(&mut self, states: Vec<String>) {
        self.states = states;
    }

    pub fn set_documents(&mut self, documents: Vec<Document>) {
        self.documents = documents;
    }

    pub fn set_versions(&mut self, versions: Vec<Version>) {
        self.versions = versions;
    }

    pub fn set_pages(&mut self, pages: Vec<Page>) {
        self.pages = pages;
    }

    pub fn set_current_state(&mut self, state: Option<String>) {
        self.current_state = state;
    }

    pub fn set_current_document(&mut self, document_id: Option<String>) {
        self.current_document = document_id;
    }

    pub fn set_current_version(&mut self, version_id: Option<String>) {
        self.current_version = version_id;
    }

    pub fn set_current_page(&mut self, page_id: Option<String>) {
        self.current_page = page_id;
    }

    pub fn set_is_loading(&mut self, is_loading: bool) {
        self.is_loading = is_loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    /// Replaces user, states, and all entity lists in one step.
    pub fn load_dataset(&mut self, user: User, states: Vec<String>, dataset: Dataset) {
        self.user = Some(user);
        self.states = states;
        self.documents = dataset.documents;
        self.versions = dataset.versions;
        self.pages = dataset.pages;
    }

    /// Returns every field to its initial value.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // --- Accessors ---

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current_state.as_deref()
    }

    pub fn current_document(&self) -> Option<&str> {
        self.current_document.as_deref()
    }

    pub fn current_version(&self) -> Option<&str> {
        self.current_version.as_deref()
    }

    pub fn current_page(&self) -> Option<&str> {
        self.current_page.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    // --- Derived queries ---

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn version(&self, id: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn documents_for_state(&self, state: &str) -> Vec<&Document> {
        self.documents.iter().filter(|d| d.state == state).collect()
    }

    /// Newest first.
    pub fn versions_for_document(&self, document_id: &str) -> Vec<&Version> {
        let mut versions: Vec<&Version> = self
            .versions
            .iter()
            .filter(|v| v.document_id == document_id)
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        versions
    }

    /// In page order.
    pub fn pages_for_version(&self, version_id: &str) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self
            .pages
            .iter()
            .filter(|p| p.version_id == version_id)
            .collect();
        pages.sort_by_key(|p| p.page_number);
        pages
    }

    pub fn documents_for_current_state(&self) -> Vec<&Document> {
        self.current_state
            .as_deref()
            .map(|state| self.documents_for_state(state))
            .unwrap_or_default()
    }

    pub fn versions_for_current_document(&self) -> Vec<&Version> {
        self.current_document
            .as_deref()
            .map(|id| self.versions_for_document(id))
            .unwrap_or_default()
    }

    pub fn pages_for_current_version(&self) -> Vec<&Page> {
        self.current_version
            .as_deref()
            .map(|id| self.pages_for_version(id))
            .unwrap_or_default()
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut crumbs = vec![Breadcrumb {
            label: "States".to_string(),
            path: "/".to_string(),
            active: self.current_state.is_none(),
        }];
        if let Some(state) = &self.current_state {
            crumbs.push(Breadcrumb {
                label: state.clone(),
                path: format!("/states/{}", state),
                active: self.current_document.is_none(),
            });
        }
        if let Some(document) = &self.current_document {
            crumbs.push(Breadcrumb {
                label: "Document".to_string(),
                path: format!("/documents/{}", document),
                active: self.current_version.is_none(),
            });
        }
        if let Some(version) = &self.current_version {
            crumbs.push(Breadcrumb {
                label: "Version".to_string(),
                path: format!("/versions/{}/pages", version),
                active: true,
            });
        }
        crumbs
    }

    /// Reports how the selection disagrees with the loaded data. Read-only.
    pub fn selection_issues(&self) -> Vec<SelectionIssue> {
        let mut issues = Vec::new();

        if let Some(state) = &self.current_state {
            if !self.states.contains(state) {
                issues.push(SelectionIssue::UnknownState(state.clone()));
            }
        }

        if let Some(doc_id) = &self.current_document {
            match self.document(doc_id) {
                None => issues.push(SelectionIssue::UnknownDocument(doc_id.clone())),
                Some(doc) => {
                    if let Some(state) = &self.current_state {
                        if &doc.state != state {
                            issues.push(SelectionIssue::DocumentOutsideState {
                                document: doc_id.clone(),
                                state: state.clone(),
                            });
                        }
                    }
                }
            }
        }

        if let Some(version_id) = &self.current_version {
            match self.version(version_id) {
                None => issues.push(SelectionIssue::UnknownVersion(version_id.clone())),
                Some(version) => {
                    if let Some(doc_id) = &self.current_document {
                        if &version.document_id != doc_id {
                            issues.push(SelectionIssue::VersionOutsideDocument {
                                version: version_id.clone(),
                                document: doc_id.clone(),
                            });
                        }
                    }
                }
            }
        }

        if let Some(page_id) = &self.current_page {
            match self.page(page_id) {
                None => issues.push(SelectionIssue::UnknownPage(page_id.clone())),
                Some(page) => {
                    if let Some(version_id) = &self.current_version {
                        if &page.version_id != version_id {
                            issues.push(SelectionIssue::PageOutsideVersion {
                                page: page_id.clone(),
                                version: version_id.clone(),
                            });
                        }
                    }
                }
            }
        }

        issues
    }

    // --- Snapshot ---

    pub fn to_snapshot(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_snapshot(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentStatus, Role, ValidationRule};
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn version(id: &str, document_id: &str, number: u32) -> Version {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Version {
            id: id.to_string(),
            document_id: document_id.to_string(),
            version_number: number,
            status: DocumentStatus::New,
            created_at: at,
            updated_at: at,
        }
    }

    fn page(id: &str, version_id: &str, number: u32) -> Page {
        Page {
            id: id.to_string(),
            version_id: version_id.to_string(),
            page_number: number,
            image_url: "/placeholder.svg".to_string(),
            json: json!({ "fields": [] }),
            validation_rules: vec![ValidationRule {
                id: format!("rule-{id}"),
                page_id: id.to_string(),
                description: "Validate".to_string(),
                field: "field1".to_string(),
                rule: "length > 1".to_string(),
            }],
        }
    }

    fn document(id: &str, state: &str) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{state} Form"),
            state: state.to_string(),
            versions_count: 1,
            last_edited: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            status: DocumentStatus::Review,
        }
    }

    #[fixture]
    fn populated() -> AppStore {
        let mut store = AppStore::new();
        store.set_states(vec!["Texas".to_string(), "Florida".to_string()]);
        store.set_documents(vec![document("doc-a", "Texas"), document("doc-b", "Florida")]);
        store.set_versions(vec![
            version("v-a1", "doc-a", 1),
            version("v-b1", "doc-b", 1),
            version("v-a3", "doc-a", 3),
            version("v-a2", "doc-a", 2),
        ]);
        store.set_pages(vec![
            page("p-2", "v-a1", 2),
            page("p-x", "v-b1", 1),
            page("p-1", "v-a1", 1),
        ]);
        store
    }

    #[rstest]
    fn versions_for_document_are_filtered_and_newest_first(populated: AppStore) {
        let ids: Vec<&str> = populated
            .versions_for_document("doc-a")
            .iter()
            .map(|v| v.id.as_str())
            .collect();
        assert_eq!(ids, vec!["v-a3", "v-a2", "v-a1"]);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![("only", "doc-a", 7)])]
    #[case(vec![("x", "doc-z", 1)])]
    #[case(vec![("a", "doc-a", 1), ("b", "doc-z", 9), ("c", "doc-a", 4)])]
    fn versions_for_document_tracks_the_last_set_list(
        mut populated: AppStore,
        #[case] input: Vec<(&str, &str, u32)>,
    ) {
        let versions: Vec<Version> = input
            .iter()
            .map(|(id, doc, n)| version(id, doc, *n))
            .collect();
        populated.set_versions(versions.clone());

        let mut expected: Vec<&Version> =
            versions.iter().filter(|v| v.document_id == "doc-a").collect();
        expected.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        assert_eq!(populated.versions_for_document("doc-a"), expected);
    }

    #[rstest]
    fn pages_for_version_are_in_page_order(populated: AppStore) {
        let numbers: Vec<u32> = populated
            .pages_for_version("v-a1")
            .iter()
            .map(|p| p.page_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[rstest]
    fn current_queries_follow_the_selection(mut populated: AppStore) {
        assert!(populated.documents_for_current_state().is_empty());

        populated.set_current_state(Some("Florida".to_string()));
        populated.set_current_document(Some("doc-a".to_string()));
        populated.set_current_version(Some("v-b1".to_string()));

        assert_eq!(populated.documents_for_current_state()[0].id, "doc-b");
        assert_eq!(populated.versions_for_current_document().len(), 3);
        assert_eq!(populated.pages_for_current_version()[0].id, "p-x");
    }

    #[rstest]
    fn clearing_page_does_not_cascade(mut populated: AppStore) {
        populated.set_current_state(Some("Texas".to_string()));
        populated.set_current_document(Some("doc-a".to_string()));
        populated.set_current_version(Some("v-a1".to_string()));
        populated.set_current_page(Some("page-1".to_string()));

        populated.set_current_page(None);

        assert_eq!(populated.current_state(), Some("Texas"));
        assert_eq!(populated.current_document(), Some("doc-a"));
        assert_eq!(populated.current_version(), Some("v-a1"));
        assert_eq!(populated.current_page(), None);
    }

    #[rstest]
    fn replacing_lists_leaves_selection_dangling(mut populated: AppStore) {
        populated.set_current_document(Some("doc-a".to_string()));
        populated.set_documents(Vec::new());

        assert_eq!(populated.current_document(), Some("doc-a"));
        assert_eq!(
            populated.selection_issues(),
            vec![SelectionIssue::UnknownDocument("doc-a".to_string())]
        );
    }

    #[rstest]
    fn selection_issues_report_mismatched_parents(mut populated: AppStore) {
        populated.set_current_state(Some("Florida".to_string()));
        populated.set_current_document(Some("doc-a".to_string()));
        populated.set_current_version(Some("v-a2".to_string()));
        populated.set_current_page(Some("p-x".to_string()));

        let issues = populated.selection_issues();
        assert_eq!(
            issues,
            vec![
                SelectionIssue::DocumentOutsideState {
                    document: "doc-a".to_string(),
                    state: "Florida".to_string(),
                },
                SelectionIssue::PageOutsideVersion {
                    page: "p-x".to_string(),
                    version: "v-a2".to_string(),
                },
            ]
        );
        // Inspection only.
        assert_eq!(populated.current_page(), Some("p-x"));
    }

    #[test]
    fn set_user_leaves_other_fields_alone() {
        let mut store = AppStore::new();
        store.set_current_state(Some("Texas".to_string()));
        store.set_user(Some(User {
            id: "u".to_string(),
            email: "u@example.com".to_string(),
            name: "U".to_string(),
            role: Role::Dev,
            states: Default::default(),
        }));
        store.set_user(None);
        assert_eq!(store.current_state(), Some("Texas"));
    }

    #[test]
    fn breadcrumbs_follow_selection_depth() {
        let mut store = AppStore::new();
        assert_eq!(store.breadcrumbs().len(), 1);
        assert!(store.breadcrumbs()[0].active);

        store.set_current_state(Some("Texas".to_string()));
        store.set_current_document(Some("doc-a".to_string()));
        let crumbs = store.breadcrumbs();
        let labels: Vec<&str> = crumbs.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["States", "Texas", "Document"]);
        assert_eq!(crumbs.iter().filter(|c| c.active).count(), 1);
        assert!(crumbs[2].active);
        assert_eq!(crumbs[1].path, "/states/Texas");
    }

    #[rstest]
    fn snapshot_round_trip_preserves_everything(mut populated: AppStore) {
        populated.set_current_page(Some("p-1".to_string()));
        populated.set_error(Some("boom".to_string()));
        populated.set_is_loading(true);

        let json = populated.to_snapshot().unwrap();
        assert!(json.contains("\"currentPage\":\"p-1\""));
        assert_eq!(AppStore::from_snapshot(&json).unwrap(), populated);
    }

    #[test]
    fn partial_snapshot_fills_defaults() {
        let store = AppStore::from_snapshot(r#"{"states":["Texas"]}"#).unwrap();
        assert_eq!(store.states(), ["Texas".to_string()]);
        assert!(store.user().is_none());
    }
}
