//! crates/doc_review_core/src/domain.rs
//!
//! Defines the pure, core data structures for the review console.
//! Entities reference their owners by id only; there is no nested containment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Schema-less structured content attached to a page.
pub type PagePayload = serde_json::Value;

//=========================================================================================
// Roles and Users
//=========================================================================================

/// Access level granted to a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User management.
    Admin,
    /// Approves or rejects content.
    Dev,
    /// Edits page content and validation rules.
    Cca,
    /// No access. `"none"` is accepted as an alias.
    #[serde(alias = "none")]
    Unassigned,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Dev => "dev",
            Role::Cca => "cca",
            Role::Unassigned => "unassigned",
        }
    }

    /// Parses a role string as returned by the user directory.
    ///
    /// Returns `None` for anything outside the known role set.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "dev" => Some(Role::Dev),
            "cca" => Some(Role::Cca),
            "unassigned" | "none" => Some(Role::Unassigned),
            _ => None,
        }
    }

    /// Whether this role may use the document browsing pages after sign-in.
    pub fn is_session_role(&self) -> bool {
        matches!(self, Role::Dev | Role::Cca)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The application's view of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub states: BTreeSet<String>,
}

impl User {
    /// Unassigned users never get state access, whatever their state list says.
    pub fn can_access_state(&self, state: &str) -> bool {
        self.role != Role::Unassigned && self.states.contains(state)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//=========================================================================================
// Documents, Versions, Pages
//=========================================================================================

/// Workflow status shown on documents and versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    New,
    InProgress,
    Review,
    Complete,
    AiProcess,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::New,
        DocumentStatus::InProgress,
        DocumentStatus::Review,
        DocumentStatus::Complete,
        DocumentStatus::AiProcess,
    ];

    /// The wire form, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::New => "new",
            DocumentStatus::InProgress => "in-progress",
            DocumentStatus::Review => "review",
            DocumentStatus::Complete => "complete",
            DocumentStatus::AiProcess => "ai-process",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatus::New => "New",
            DocumentStatus::InProgress => "In Progress",
            DocumentStatus::Review => "Ready for CCA Review",
            DocumentStatus::Complete => "CCA Review Complete",
            DocumentStatus::AiProcess => "AI in Process",
        }
    }

    /// Colour token used by the status badge.
    pub fn color(&self) -> &'static str {
        match self {
            DocumentStatus::New => "status-new",
            DocumentStatus::InProgress => "status-in-progress",
            DocumentStatus::Review => "status-review",
            DocumentStatus::Complete => "status-complete",
            DocumentStatus::AiProcess => "status-ai-process",
        }
    }
}

/// A named form scoped to one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub state: String,
    pub versions_count: u32,
    pub last_edited: DateTime<Utc>,
    pub status: DocumentStatus,
}

/// A numbered revision of a document. Higher `version_number` is newer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub document_id: String,
    pub version_number: u32,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub version_id: String,
    pub page_number: u32,
    pub image_url: String,
    pub json: PagePayload,
    pub validation_rules: Vec<ValidationRule>,
}

/// A check attached to a page. List position is display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub id: String,
    pub page_id: String,
    pub description: String,
    pub field: String,
    pub rule: String,
}

/// The flat entity lists loaded for a set of states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub documents: Vec<Document>,
    pub versions: Vec<Version>,
    pub pages: Vec<Page>,
}

//=========================================================================================
// Identity
//=========================================================================================

/// Claims asserted by the identity provider for the signed-in subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub subject: String,
    pub name: String,
    pub email: String,
}

/// A user record as held by the external user directory.
///
/// `role` stays a raw string here; it is only trusted once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub subject_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub states: Vec<String>,
}

/// Payload sent to the directory when a subject has no record yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDirectoryUser {
    pub subject_id: String,
    pub name: String,
    pub email: String,
}

impl From<&IdentityClaims> for NewDirectoryUser {
    fn from(claims: &IdentityClaims) -> Self {
        Self {
            subject_id: claims.subject.clone(),
            name: claims.name.clone(),
            email: claims.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("admin", Some(Role::Admin))]
    #[case("dev", Some(Role::Dev))]
    #[case("CCA", Some(Role::Cca))]
    #[case("unassigned", Some(Role::Unassigned))]
    #[case("none", Some(Role::Unassigned))]
    #[case("superuser", None)]
    #[case("", None)]
    fn parses_known_roles_only(#[case] raw: &str, #[case] expected: Option<Role>) {
        assert_eq!(Role::parse(raw), expected);
    }

    #[test]
    fn role_serde_accepts_none_alias() {
        let role: Role = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(role, Role::Unassigned);
        assert_eq!(serde_json::to_string(&Role::Cca).unwrap(), "\"cca\"");
    }

    #[test]
    fn unassigned_user_has_no_state_access() {
        let user = User {
            id: "u-1".to_string(),
            email: "x@example.com".to_string(),
            name: "X".to_string(),
            role: Role::Unassigned,
            states: ["Texas".to_string()].into_iter().collect(),
        };
        assert!(!user.can_access_state("Texas"));

        let cca = User { role: Role::Cca, ..user };
        assert!(cca.can_access_state("Texas"));
        assert!(!cca.can_access_state("Florida"));
    }

    #[test]
    fn status_uses_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&DocumentStatus::AiProcess).unwrap();
        assert_eq!(json, "\"ai-process\"");
        for status in DocumentStatus::ALL {
            let wire = serde_json::to_string(&status).unwrap();
            assert_eq!(wire.trim_matches('"'), status.as_str());
        }
        assert_eq!(DocumentStatus::Review.label(), "Ready for CCA Review");
    }
}
