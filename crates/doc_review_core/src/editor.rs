//! crates/doc_review_core/src/editor.rs
//!
//! Page editing and review: what each role may do on the editor page, an
//! editable draft of a page's JSON and rules, and approve/reject decisions.

use crate::domain::{Page, PagePayload, Role, User, ValidationRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("Page content is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("No validation rule at position {0}")]
    NoSuchRule(usize),
    #[error("Role '{0}' may not perform this action")]
    Forbidden(Role),
}

/// Which editor actions the signed-in role has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePermissions {
    pub can_edit: bool,
    pub can_approve: bool,
}

impl PagePermissions {
    pub fn for_role(role: Role) -> Self {
        Self {
            can_edit: role == Role::Cca,
            can_approve: role == Role::Dev,
        }
    }
}

/// A rule column that can be edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleField {
    Description,
    Field,
    Rule,
}

/// An editable copy of one page's JSON and validation rules.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDraft {
    page_id: String,
    json: PagePayload,
    rules: Vec<ValidationRule>,
}

impl PageDraft {
    pub fn from_page(page: &Page) -> Self {
        Self {
            page_id: page.id.clone(),
            json: page.json.clone(),
            rules: page.validation_rules.clone(),
        }
    }

    pub fn json(&self) -> &PagePayload {
        &self.json
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    /// Replaces the JSON from editor text. Invalid text leaves the draft unchanged.
    pub fn set_json_text(&mut self, text: &str) -> Result<(), EditorError> {
        self.json = serde_json::from_str(text)?;
        Ok(())
    }

    pub fn set_json(&mut self, json: PagePayload) {
        self.json = json;
    }

    /// Appends a blank rule and returns its id.
    pub fn add_rule(&mut self) -> String {
        let id = format!("new-rule-{}", Uuid::new_v4());
        self.rules.push(ValidationRule {
            id: id.clone(),
            page_id: self.page_id.clone(),
            description: "New validation rule".to_string(),
            field: String::new(),
            rule: String::new(),
        });
        id
    }

    pub fn update_rule(
        &mut self,
        index: usize,
        field: RuleField,
        value: impl Into<String>,
    ) -> Result<(), EditorError> {
        let rule = self
            .rules
            .get_mut(index)
            .ok_or(EditorError::NoSuchRule(index))?;
        let value = value.into();
        match field {
            RuleField::Description => rule.description = value,
            RuleField::Field => rule.field = value,
            RuleField::Rule => rule.rule = value,
        }
        Ok(())
    }

    pub fn remove_rule(&mut self, index: usize) -> Result<ValidationRule, EditorError> {
        if index >= self.rules.len() {
            return Err(EditorError::NoSuchRule(index));
        }
        Ok(self.rules.remove(index))
    }

    /// Returns `pages` with this draft's page replaced. Other pages are untouched.
    pub fn apply_to(&self, pages: &[Page]) -> Vec<Page> {
        pages
            .iter()
            .map(|page| {
                if page.id == self.page_id {
                    Page {
                        json: self.json.clone(),
                        validation_rules: self.rules.clone(),
                        ..page.clone()
                    }
                } else {
                    page.clone()
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewVerdict {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub page_id: String,
    pub reviewer: String,
    pub verdict: ReviewVerdict,
    pub decided_at: DateTime<Utc>,
}

/// Records a verdict on a page. Only reviewers with approve rights may decide.
pub fn review_page(
    user: &User,
    page: &Page,
    verdict: ReviewVerdict,
    now: DateTime<Utc>,
) -> Result<ReviewDecision, EditorError> {
    if !PagePermissions::for_role(user.role).can_approve {
        return Err(EditorError::Forbidden(user.role));
    }
    Ok(ReviewDecision {
        page_id: page.id.clone(),
        reviewer: user.email.clone(),
        verdict,
        decided_at: now,
    })
}
