//! Notes, their sections, and publication status.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::account::OwnerSummary;
use crate::errors::{DomainError, DomainResult};
use crate::template::{self, Field, FieldDraft};

pub const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteStatus {
    Draft,
    Publish,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Publish => "Publish",
        }
    }
}

impl std::fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(Self::Draft),
            "Publish" => Ok(Self::Publish),
            _ => Err(DomainError::InvalidStatus),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub template_id: String,
    pub owner_id: String,
    pub status: NoteStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Content of one template field within a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: Option<String>,
    pub field_id: String,
    pub content: String,
}

impl Section {
    pub fn new(field_id: &str, content: &str) -> Self {
        Self {
            id: None,
            field_id: field_id.to_string(),
            content: content.to_string(),
        }
    }
}

/// Stored section joined with the metadata of its field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionWithField {
    pub id: String,
    pub field_id: String,
    pub field_label: String,
    #[serde(skip)]
    pub field_order: i32,
    pub content: String,
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteWithMeta {
    #[serde(flatten)]
    pub note: Note,
    pub template_name: String,
    pub owner: OwnerSummary,
    pub sections: Vec<SectionWithField>,
}

#[derive(Debug, Clone, Default)]
pub struct NoteFilters {
    pub status: Option<NoteStatus>,
    pub template_id: Option<String>,
    pub owner_id: Option<String>,
    pub query: Option<String>,
}

/// Section content change addressed by section id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionUpdate {
    pub section_id: String,
    pub content: String,
}

/// Both directions between the two statuses are allowed, as are no-ops.
pub fn can_change_status(from: NoteStatus, to: NoteStatus) -> DomainResult<()> {
    match (from, to) {
        (NoteStatus::Draft, NoteStatus::Publish)
        | (NoteStatus::Publish, NoteStatus::Draft)
        | (NoteStatus::Draft, NoteStatus::Draft)
        | (NoteStatus::Publish, NoteStatus::Publish) => Ok(()),
    }
}

fn ensure_actor_owns(note: &Note, actor_id: &str) -> DomainResult<()> {
    if actor_id.is_empty() || note.owner_id != actor_id {
        return Err(DomainError::Unauthorized);
    }
    Ok(())
}

/// Only the owner may publish.
pub fn can_publish(note: &Note, actor_id: &str) -> DomainResult<()> {
    ensure_actor_owns(note, actor_id)?;
    can_change_status(note.status, NoteStatus::Publish)
}

/// Only the owner may move a note back to draft.
pub fn can_unpublish(note: &Note, actor_id: &str) -> DomainResult<()> {
    ensure_actor_owns(note, actor_id)?;
    can_change_status(note.status, NoteStatus::Draft)
}

pub fn validate_title(title: &str) -> DomainResult<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::TitleRequired);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::TitleTooLong { max: MAX_TITLE_LEN });
    }
    Ok(())
}

/// Sections must cover every template field exactly once, and required
/// fields must have content.
pub fn validate_sections(fields: &[Field], sections: &[Section]) -> DomainResult<()> {
    if sections.is_empty() {
        return Err(DomainError::SectionsMissing);
    }
    let lookup: HashMap<&str, &Field> = fields.iter().map(|f| (f.id.as_str(), f)).collect();
    let mut seen = HashSet::new();
    for section in sections {
        let field = lookup
            .get(section.field_id.as_str())
            .ok_or(DomainError::SectionsMissing)?;
        if !seen.insert(section.field_id.as_str()) {
            return Err(DomainError::SectionsMissing);
        }
        if field.is_required && section.content.trim().is_empty() {
            return Err(DomainError::RequiredFieldEmpty);
        }
    }
    if seen.len() != lookup.len() {
        return Err(DomainError::SectionsMissing);
    }
    Ok(())
}

pub fn validate_note_for_create(
    title: &str,
    tpl: &template::Template,
    sections: &[Section],
) -> DomainResult<()> {
    validate_title(title)?;
    if tpl.owner_id.trim().is_empty() {
        return Err(DomainError::OwnerRequired);
    }
    let drafts = tpl
        .fields
        .iter()
        .map(|f| FieldDraft::existing(&f.id, &f.label, f.order, f.is_required))
        .collect();
    template::validate_template(&tpl.name, &tpl.owner_id, drafts)?;
    validate_sections(&tpl.fields, sections)
}

pub fn validate_ownership(owner_id: &str, actor_id: &str) -> DomainResult<()> {
    if owner_id.trim().is_empty() || actor_id.trim().is_empty() {
        return Err(DomainError::OwnerRequired);
    }
    if owner_id != actor_id {
        return Err(DomainError::Unauthorized);
    }
    Ok(())
}

/// Resolve section updates against the stored sections. The field a section
/// belongs to always comes from storage, never from the client.
pub fn sections_for_update(
    existing: &[SectionWithField],
    updates: &[SectionUpdate],
) -> DomainResult<Vec<Section>> {
    let field_by_section: HashMap<&str, &str> = existing
        .iter()
        .map(|s| (s.id.as_str(), s.field_id.as_str()))
        .collect();
    updates
        .iter()
        .map(|u| {
            let field_id = field_by_section
                .get(u.section_id.as_str())
                .ok_or(DomainError::SectionsMissing)?;
            Ok(Section {
                id: Some(u.section_id.clone()),
                field_id: field_id.to_string(),
                content: u.content.clone(),
            })
        })
        .collect()
}
