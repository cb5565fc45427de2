//! Use cases behind the HTTP handlers.
//!
//! Each function takes the synchronous `NotionDb` (handlers reach it through
//! `DbHandle::call`) and runs its reads and writes in a single transaction,
//! so a rule violation discovered halfway leaves the store untouched.

use tracing::{debug, info};

use mini_notion_common::account::{self, Account, Email, OAuthAccountInput};
use mini_notion_common::note::{self, NoteFilters, NoteStatus, NoteWithMeta, Section, SectionUpdate};
use mini_notion_common::template::{
    self, FieldDraft, FieldPlan, NewField, TemplateFilters, TemplateWithUsage,
};
use mini_notion_common::DomainError;

use super::db::{NotionDb, now};
use crate::errors::{NotionError, NotionResult};

// ── Accounts ──────────────────────────────────────────────────────────

/// Insert the account on first sign-in, otherwise merge the fresh identity
/// payload into the stored one. Either way `last_login_at` is stamped.
pub fn create_or_get_account(db: &NotionDb, input: OAuthAccountInput) -> NotionResult<Account> {
    let email = Email::parse(&input.email)?;
    account::validate(&input)?;

    db.transaction(|db| -> NotionResult<Account> {
        let ts = now();
        match db.get_account_by_email(&email)? {
            Some(current) => {
                let mut updated = account::update_profile(current, &input)?;
                updated.last_login_at = Some(ts.clone());
                updated.updated_at = ts;
                db.update_account(&updated)?;
                debug!(account_id = %updated.id, "Account signed in");
                Ok(updated)
            }
            None => {
                let created = Account {
                    id: uuid::Uuid::new_v4().to_string(),
                    email,
                    first_name: input.first_name.trim().to_string(),
                    last_name: input.last_name.trim().to_string(),
                    provider: input.provider.clone(),
                    provider_account_id: input.provider_account_id.clone(),
                    thumbnail: input.thumbnail.clone(),
                    last_login_at: Some(ts.clone()),
                    created_at: ts.clone(),
                    updated_at: ts,
                };
                db.insert_account(&created)?;
                info!(account_id = %created.id, "Account created");
                Ok(created)
            }
        }
    })
}

pub fn get_account(db: &NotionDb, id: &str) -> NotionResult<Account> {
    require_account(db, id)
}

pub fn get_account_by_email(db: &NotionDb, email: &str) -> NotionResult<Account> {
    let email = Email::parse(email)?;
    db.get_account_by_email(&email)?
        .ok_or_else(|| NotionError::from(DomainError::not_found("account")))
}

fn require_account(db: &NotionDb, id: &str) -> NotionResult<Account> {
    db.get_account(id)?
        .ok_or_else(|| NotionError::from(DomainError::not_found("account")))
}

// ── Templates ─────────────────────────────────────────────────────────

pub fn list_templates(db: &NotionDb, filters: &TemplateFilters) -> NotionResult<Vec<TemplateWithUsage>> {
    Ok(db.list_templates(filters)?)
}

pub fn get_template(db: &NotionDb, id: &str) -> NotionResult<TemplateWithUsage> {
    load_template(db, id)
}

fn load_template(db: &NotionDb, id: &str) -> NotionResult<TemplateWithUsage> {
    db.get_template(id)?
        .ok_or_else(|| NotionError::from(DomainError::not_found("template")))
}

pub fn create_template(
    db: &NotionDb,
    actor_id: &str,
    name: &str,
    fields: Vec<FieldDraft>,
) -> NotionResult<TemplateWithUsage> {
    db.transaction(|db| -> NotionResult<TemplateWithUsage> {
        require_account(db, actor_id)?;
        let drafts = template::validate_template(name, actor_id, fields)?;
        let new_fields: Vec<NewField> = drafts
            .into_iter()
            .map(|d| NewField {
                label: d.label,
                order: d.order,
                is_required: d.is_required,
            })
            .collect();
        let id = db.create_template(name.trim(), actor_id, &new_fields)?;
        info!(template_id = %id, owner_id = actor_id, fields = new_fields.len(), "Template created");
        load_template(db, &id)
    })
}

/// Rename a template and, when `fields` is given, move its fields to the
/// submitted list. Once notes use the template only relabelling passes.
pub fn update_template(
    db: &NotionDb,
    actor_id: &str,
    id: &str,
    name: &str,
    fields: Option<Vec<FieldDraft>>,
) -> NotionResult<TemplateWithUsage> {
    db.transaction(|db| -> NotionResult<TemplateWithUsage> {
        let current = load_template(db, id)?;
        template::validate_ownership(&current.template.owner_id, actor_id)?;
        template::validate_name(name)?;

        if let Some(fields) = fields {
            let drafts = template::validate_template(name, actor_id, fields)?;
            let plan = template::plan_field_changes(&current.template.fields, &drafts, current.is_used)?;
            if plan.is_empty() {
                debug!(template_id = id, "Fields unchanged");
            } else {
                apply_field_plan(db, id, &plan)?;
                debug!(
                    template_id = id,
                    locked = current.is_used,
                    deletes = plan.deletes.len(),
                    updates = plan.updates.len(),
                    inserts = plan.inserts.len(),
                    "Applied field plan"
                );
            }
        }

        db.rename_template(id, name.trim())?;
        info!(template_id = id, "Template updated");
        load_template(db, id)
    })
}

fn apply_field_plan(db: &NotionDb, template_id: &str, plan: &FieldPlan) -> NotionResult<()> {
    for field_id in &plan.deletes {
        db.delete_field(field_id)?;
    }
    for field in &plan.updates {
        db.update_field(field)?;
    }
    for field in &plan.inserts {
        db.insert_field(template_id, field)?;
    }
    Ok(())
}

pub fn delete_template(db: &NotionDb, actor_id: &str, id: &str) -> NotionResult<()> {
    db.transaction(|db| -> NotionResult<()> {
        let current = load_template(db, id)?;
        template::validate_ownership(&current.template.owner_id, actor_id)?;
        template::can_delete(current.is_used)?;
        db.delete_template(id)?;
        info!(template_id = id, "Template deleted");
        Ok(())
    })
}

// ── Notes ─────────────────────────────────────────────────────────────

pub fn list_notes(db: &NotionDb, filters: &NoteFilters) -> NotionResult<Vec<NoteWithMeta>> {
    Ok(db.list_notes(filters)?)
}

pub fn get_note(db: &NotionDb, id: &str) -> NotionResult<NoteWithMeta> {
    load_note(db, id)
}

fn load_note(db: &NotionDb, id: &str) -> NotionResult<NoteWithMeta> {
    db.get_note(id)?
        .ok_or_else(|| NotionError::from(DomainError::not_found("note")))
}

pub fn create_note(
    db: &NotionDb,
    actor_id: &str,
    title: &str,
    template_id: &str,
    sections: Vec<Section>,
) -> NotionResult<NoteWithMeta> {
    if actor_id.trim().is_empty() {
        return Err(NotionError::from(DomainError::OwnerRequired));
    }
    db.transaction(|db| -> NotionResult<NoteWithMeta> {
        require_account(db, actor_id)?;
        let tpl = load_template(db, template_id)?;
        note::validate_note_for_create(title, &tpl.template, &sections)?;
        let id = db.create_note(title.trim(), template_id, actor_id, &sections)?;
        info!(note_id = %id, template_id, owner_id = actor_id, "Note created");
        load_note(db, &id)
    })
}

/// Retitle a note and optionally rewrite section contents. Sections are
/// addressed by id and must still cover every field of the template.
pub fn update_note(
    db: &NotionDb,
    actor_id: &str,
    id: &str,
    title: &str,
    sections: Option<Vec<SectionUpdate>>,
) -> NotionResult<NoteWithMeta> {
    db.transaction(|db| -> NotionResult<NoteWithMeta> {
        let current = load_note(db, id)?;
        note::validate_ownership(&current.note.owner_id, actor_id)?;
        note::validate_title(title)?;
        db.update_note_title(id, title.trim())?;

        if let Some(updates) = sections {
            let fields = db.template_fields(&current.note.template_id)?;
            let resolved = note::sections_for_update(&current.sections, &updates)?;
            note::validate_sections(&fields, &resolved)?;
            for section in &resolved {
                if let Some(section_id) = section.id.as_deref() {
                    db.update_section_content(id, section_id, &section.content)?;
                }
            }
        }

        info!(note_id = id, "Note updated");
        load_note(db, id)
    })
}

pub fn change_status(
    db: &NotionDb,
    actor_id: &str,
    id: &str,
    status: NoteStatus,
) -> NotionResult<NoteWithMeta> {
    db.transaction(|db| -> NotionResult<NoteWithMeta> {
        let current = load_note(db, id)?;
        note::validate_ownership(&current.note.owner_id, actor_id)?;
        match status {
            NoteStatus::Publish => note::can_publish(&current.note, actor_id)?,
            NoteStatus::Draft => note::can_unpublish(&current.note, actor_id)?,
        }
        db.set_note_status(id, status)?;
        info!(note_id = id, from = %current.note.status, to = %status, "Note status changed");
        load_note(db, id)
    })
}

pub fn delete_note(db: &NotionDb, actor_id: &str, id: &str) -> NotionResult<()> {
    db.transaction(|db| -> NotionResult<()> {
        let current = load_note(db, id)?;
        note::validate_ownership(&current.note.owner_id, actor_id)?;
        db.delete_note(id)?;
        info!(note_id = id, "Note deleted");
        Ok(())
    })
}
