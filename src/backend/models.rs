//! Request and response bodies for the HTTP API.
//!
//! Template and note responses serialize the domain types from
//! `mini-notion-common` directly; only accounts need a dedicated response
//! shape (it adds `fullName` and drops provider identity).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use mini_notion_common::account::{Account, OAuthAccountInput};
use mini_notion_common::note::{NoteFilters, NoteStatus, Section, SectionUpdate};
use mini_notion_common::template::{FieldDraft, TemplateFilters};
use mini_notion_common::DomainResult;

// ── Accounts ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthAccountRequest {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub provider_account_id: String,
    pub thumbnail: Option<String>,
}

impl AuthAccountRequest {
    pub fn into_input(self) -> OAuthAccountInput {
        OAuthAccountInput::from_display_name(
            &self.email,
            &self.name,
            &self.provider,
            &self.provider_account_id,
            self.thumbnail,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub thumbnail: Option<String>,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            full_name: account.full_name(),
            id: account.id,
            email: account.email.to_string(),
            first_name: account.first_name,
            last_name: account.last_name,
            thumbnail: account.thumbnail,
            last_login_at: account.last_login_at,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

// ── Templates ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInput {
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub is_required: bool,
}

impl From<FieldInput> for FieldDraft {
    fn from(input: FieldInput) -> Self {
        FieldDraft {
            id: input.id.filter(|id| !id.trim().is_empty()),
            label: input.label,
            order: input.order,
            is_required: input.is_required,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: String,
    /// Omitted means "leave fields as they are".
    pub fields: Option<Vec<FieldInput>>,
}

pub fn field_drafts(inputs: Vec<FieldInput>) -> Vec<FieldDraft> {
    inputs.into_iter().map(FieldDraft::from).collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuery {
    pub q: Option<String>,
    pub owner_id: Option<String>,
}

impl From<TemplateQuery> for TemplateFilters {
    fn from(query: TemplateQuery) -> Self {
        TemplateFilters {
            query: query.q,
            owner_id: query.owner_id,
        }
    }
}

// ── Notes ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInput {
    pub field_id: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub title: String,
    pub template_id: String,
    #[serde(default)]
    pub sections: Vec<SectionInput>,
}

impl CreateNoteRequest {
    pub fn sections(&self) -> Vec<Section> {
        self.sections
            .iter()
            .map(|s| Section::new(&s.field_id, &s.content))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectionContentInput {
    pub id: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub title: String,
    pub sections: Option<Vec<SectionContentInput>>,
}

impl UpdateNoteRequest {
    pub fn section_updates(&self) -> Option<Vec<SectionUpdate>> {
        self.sections.as_ref().map(|sections| {
            sections
                .iter()
                .map(|s| SectionUpdate {
                    section_id: s.id.clone(),
                    content: s.content.clone(),
                })
                .collect()
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteQuery {
    pub status: Option<String>,
    pub template_id: Option<String>,
    pub owner_id: Option<String>,
    pub q: Option<String>,
}

impl NoteQuery {
    /// An empty `status` means no filter; anything else must name a status.
    pub fn into_filters(self) -> DomainResult<NoteFilters> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(NoteStatus::from_str(raw)?),
        };
        Ok(NoteFilters {
            status,
            template_id: self.template_id,
            owner_id: self.owner_id,
            query: self.q,
        })
    }
}

// ── Generic ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}
