//! Templates and their fields.
//!
//! A template is an ordered list of labelled fields. Once any note references
//! a template its structure is locked: fields may be relabelled but not
//! added, removed, reordered or toggled between required and optional.
//! [`plan_field_changes`] is the single place that rule is decided.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::account::OwnerSummary;
use crate::errors::{DomainError, DomainResult};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_LABEL_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub label: String,
    pub order: i32,
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub fields: Vec<Field>,
    pub updated_at: String,
}

/// A template together with its owner and whether any note uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateWithUsage {
    #[serde(flatten)]
    pub template: Template,
    pub owner: OwnerSummary,
    pub is_used: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateFilters {
    pub query: Option<String>,
    pub owner_id: Option<String>,
}

/// A field as submitted by a client. `id` is set for fields that already
/// exist on the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDraft {
    pub id: Option<String>,
    pub label: String,
    pub order: i32,
    pub is_required: bool,
}

impl FieldDraft {
    pub fn new(label: &str, order: i32, is_required: bool) -> Self {
        Self {
            id: None,
            label: label.to_string(),
            order,
            is_required,
        }
    }

    pub fn existing(id: &str, label: &str, order: i32, is_required: bool) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::new(label, order, is_required)
        }
    }
}

/// Fill missing orders (`0` becomes the 1-based position), trim labels and
/// validate. The result is sorted by order.
pub fn normalize_and_validate(mut fields: Vec<FieldDraft>) -> DomainResult<Vec<FieldDraft>> {
    if fields.is_empty() {
        return Err(DomainError::FieldRequired);
    }
    for (idx, field) in fields.iter_mut().enumerate() {
        if field.order == 0 {
            field.order = idx as i32 + 1;
        }
        field.label = field.label.trim().to_string();
    }

    let mut seen = HashSet::new();
    for field in &fields {
        if field.label.is_empty() {
            return Err(DomainError::FieldLabelRequired);
        }
        if field.label.chars().count() > MAX_LABEL_LEN {
            return Err(DomainError::FieldLabelTooLong { max: MAX_LABEL_LEN });
        }
        if field.order <= 0 || !seen.insert(field.order) {
            return Err(DomainError::FieldOrderInvalid);
        }
    }

    fields.sort_by_key(|f| f.order);
    Ok(fields)
}

pub fn validate_name(name: &str) -> DomainResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::TemplateNameRequired);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::TemplateNameTooLong { max: MAX_NAME_LEN });
    }
    Ok(())
}

/// Validate a whole template and return its normalized fields.
pub fn validate_template(
    name: &str,
    owner_id: &str,
    fields: Vec<FieldDraft>,
) -> DomainResult<Vec<FieldDraft>> {
    validate_name(name)?;
    if owner_id.trim().is_empty() {
        return Err(DomainError::TemplateOwnerRequired);
    }
    normalize_and_validate(fields)
}

pub fn validate_ownership(owner_id: &str, actor_id: &str) -> DomainResult<()> {
    if owner_id.trim().is_empty() || actor_id.trim().is_empty() {
        return Err(DomainError::TemplateOwnerRequired);
    }
    if owner_id != actor_id {
        return Err(DomainError::Unauthorized);
    }
    Ok(())
}

pub fn can_delete(is_used: bool) -> DomainResult<()> {
    if is_used {
        return Err(DomainError::TemplateInUse);
    }
    Ok(())
}

/// Field to be inserted by a [`FieldPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewField {
    pub label: String,
    pub order: i32,
    pub is_required: bool,
}

/// Changes needed to move a template's stored fields to a submitted list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPlan {
    pub deletes: Vec<String>,
    pub updates: Vec<Field>,
    pub inserts: Vec<NewField>,
}

impl FieldPlan {
    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// Diff `submitted` (already normalized) against `existing` by field id.
///
/// When `locked` the only change allowed is relabelling; stored order
/// values are kept as they are.
pub fn plan_field_changes(
    existing: &[Field],
    submitted: &[FieldDraft],
    locked: bool,
) -> DomainResult<FieldPlan> {
    let by_id: HashMap<&str, &Field> = existing.iter().map(|f| (f.id.as_str(), f)).collect();

    let mut kept: HashSet<&str> = HashSet::new();
    for draft in submitted {
        if let Some(id) = draft.id.as_deref() {
            if !by_id.contains_key(id) || !kept.insert(id) {
                return Err(DomainError::InvalidTemplateField);
            }
        }
    }

    let deletes: Vec<String> = existing
        .iter()
        .filter(|f| !kept.contains(f.id.as_str()))
        .map(|f| f.id.clone())
        .collect();
    let inserts: Vec<NewField> = submitted
        .iter()
        .filter(|d| d.id.is_none())
        .map(|d| NewField {
            label: d.label.clone(),
            order: d.order,
            is_required: d.is_required,
        })
        .collect();

    if locked {
        if !deletes.is_empty() {
            return Err(DomainError::TemplateFieldInUse);
        }
        if !inserts.is_empty() {
            return Err(DomainError::TemplateStructureLocked);
        }

        let mut stored: Vec<&Field> = existing.iter().collect();
        stored.sort_by_key(|f| f.order);
        let stored_seq = stored.iter().map(|f| f.id.as_str());
        let submitted_seq = submitted.iter().filter_map(|d| d.id.as_deref());
        if !stored_seq.eq(submitted_seq) {
            return Err(DomainError::TemplateStructureLocked);
        }

        let mut updates = Vec::new();
        for draft in submitted {
            let Some(current) = draft.id.as_deref().and_then(|id| by_id.get(id)) else {
                continue;
            };
            if current.is_required != draft.is_required {
                return Err(DomainError::TemplateStructureLocked);
            }
            if current.label != draft.label {
                updates.push(Field {
                    label: draft.label.clone(),
                    ..(*current).clone()
                });
            }
        }
        return Ok(FieldPlan {
            deletes,
            updates,
            inserts,
        });
    }

    let updates = submitted
        .iter()
        .filter_map(|draft| {
            let id = draft.id.as_deref()?;
            let current = by_id.get(id)?;
            let changed = current.label != draft.label
                || current.order != draft.order
                || current.is_required != draft.is_required;
            changed.then(|| Field {
                id: id.to_string(),
                label: draft.label.clone(),
                order: draft.order,
                is_required: draft.is_required,
            })
        })
        .collect();

    Ok(FieldPlan {
        deletes,
        updates,
        inserts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_fields() -> Vec<Field> {
        vec![
            Field {
                id: "f1".into(),
                label: "Title".into(),
                order: 1,
                is_required: true,
            },
            Field {
                id: "f2".into(),
                label: "Body".into(),
                order: 2,
                is_required: false,
            },
        ]
    }

    #[test]
    fn test_normalize_fills_zero_orders() {
        let fields = vec![FieldDraft::new("Title", 0, true), FieldDraft::new("Body", 0, false)];
        let out = normalize_and_validate(fields).unwrap();
        assert_eq!(out.iter().map(|f| f.order).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_normalize_sorts_by_order_and_trims() {
        let fields = vec![FieldDraft::new(" Body ", 5, false), FieldDraft::new("Title", 2, true)];
        let out = normalize_and_validate(fields).unwrap();
        assert_eq!(out[0].label, "Title");
        assert_eq!(out[1].label, "Body");
    }

    #[test]
    fn test_normalize_rejects_empty_list() {
        assert_eq!(normalize_and_validate(vec![]), Err(DomainError::FieldRequired));
    }

    #[test]
    fn test_normalize_rejects_blank_label() {
        let fields = vec![FieldDraft::new("  ", 1, false)];
        assert_eq!(normalize_and_validate(fields), Err(DomainError::FieldLabelRequired));
    }

    #[test]
    fn test_normalize_rejects_duplicate_and_negative_order() {
        let dup = vec![FieldDraft::new("A", 1, false), FieldDraft::new("B", 1, false)];
        assert_eq!(normalize_and_validate(dup), Err(DomainError::FieldOrderInvalid));
        let negative = vec![FieldDraft::new("A", -3, false)];
        assert_eq!(normalize_and_validate(negative), Err(DomainError::FieldOrderInvalid));
    }

    #[test]
    fn test_normalize_rejects_long_label() {
        let fields = vec![FieldDraft::new(&"x".repeat(101), 1, false)];
        assert_eq!(
            normalize_and_validate(fields),
            Err(DomainError::FieldLabelTooLong { max: 100 })
        );
    }

    #[test]
    fn test_validate_name_length_limit() {
        assert!(validate_name(&"x".repeat(100)).is_ok());
        assert!(validate_name(&"é".repeat(100)).is_ok());
        assert_eq!(
            validate_name(&"x".repeat(101)),
            Err(DomainError::TemplateNameTooLong { max: 100 })
        );

        let fields = vec![FieldDraft::new("Title", 1, true)];
        assert_eq!(
            validate_template(&"x".repeat(101), "owner", fields),
            Err(DomainError::TemplateNameTooLong { max: 100 })
        );
    }

    #[test]
    fn test_validate_template_checks_name_then_owner() {
        let fields = vec![FieldDraft::new("Title", 1, true)];
        assert_eq!(
            validate_template(" ", "owner", fields.clone()),
            Err(DomainError::TemplateNameRequired)
        );
        assert_eq!(
            validate_template("Daily", "", fields.clone()),
            Err(DomainError::TemplateOwnerRequired)
        );
        assert!(validate_template("Daily", "owner", fields).is_ok());
    }

    #[test]
    fn test_validate_ownership() {
        assert!(validate_ownership("owner-1", "owner-1").is_ok());
        assert_eq!(validate_ownership("owner-1", "other"), Err(DomainError::Unauthorized));
        assert_eq!(
            validate_ownership("  ", "actor"),
            Err(DomainError::TemplateOwnerRequired)
        );
    }

    #[test]
    fn test_can_delete() {
        assert!(can_delete(false).is_ok());
        assert_eq!(can_delete(true), Err(DomainError::TemplateInUse));
    }

    #[test]
    fn test_plan_unlocked_diffs_by_identity() {
        let submitted = vec![
            FieldDraft::existing("f2", "Body", 1, true),
            FieldDraft::new("Summary", 2, false),
        ];
        let plan = plan_field_changes(&stored_fields(), &submitted, false).unwrap();
        assert_eq!(plan.deletes, vec!["f1".to_string()]);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].id, "f2");
        assert_eq!(plan.updates[0].order, 1);
        assert!(plan.updates[0].is_required);
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].label, "Summary");
    }

    #[test]
    fn test_plan_unchanged_is_empty() {
        let submitted = vec![
            FieldDraft::existing("f1", "Title", 1, true),
            FieldDraft::existing("f2", "Body", 2, false),
        ];
        assert!(plan_field_changes(&stored_fields(), &submitted, true)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_plan_rejects_foreign_or_duplicate_ids() {
        let foreign = vec![FieldDraft::existing("zz", "X", 1, false)];
        assert_eq!(
            plan_field_changes(&stored_fields(), &foreign, false),
            Err(DomainError::InvalidTemplateField)
        );
        let duplicate = vec![
            FieldDraft::existing("f1", "A", 1, false),
            FieldDraft::existing("f1", "B", 2, false),
        ];
        assert_eq!(
            plan_field_changes(&stored_fields(), &duplicate, false),
            Err(DomainError::InvalidTemplateField)
        );
    }

    #[test]
    fn test_plan_locked_rejects_removal() {
        let submitted = vec![FieldDraft::existing("f1", "Title", 1, true)];
        assert_eq!(
            plan_field_changes(&stored_fields(), &submitted, true),
            Err(DomainError::TemplateFieldInUse)
        );
    }

    #[test]
    fn test_plan_locked_rejects_addition() {
        let submitted = vec![
            FieldDraft::existing("f1", "Title", 1, true),
            FieldDraft::existing("f2", "Body", 2, false),
            FieldDraft::new("Extra", 3, false),
        ];
        assert_eq!(
            plan_field_changes(&stored_fields(), &submitted, true),
            Err(DomainError::TemplateStructureLocked)
        );
    }

    #[test]
    fn test_plan_locked_rejects_reorder() {
        let submitted = vec![
            FieldDraft::existing("f2", "Body", 1, false),
            FieldDraft::existing("f1", "Title", 2, true),
        ];
        assert_eq!(
            plan_field_changes(&stored_fields(), &submitted, true),
            Err(DomainError::TemplateStructureLocked)
        );
    }

    #[test]
    fn test_plan_locked_rejects_required_toggle() {
        let submitted = vec![
            FieldDraft::existing("f1", "Title", 1, true),
            FieldDraft::existing("f2", "Body", 2, true),
        ];
        assert_eq!(
            plan_field_changes(&stored_fields(), &submitted, true),
            Err(DomainError::TemplateStructureLocked)
        );
    }

    #[test]
    fn test_plan_locked_allows_relabel_and_keeps_order() {
        let submitted = vec![
            FieldDraft::existing("f1", "Headline", 10, true),
            FieldDraft::existing("f2", "Body", 20, false),
        ];
        let plan = plan_field_changes(&stored_fields(), &submitted, true).unwrap();
        assert!(plan.deletes.is_empty());
        assert!(plan.inserts.is_empty());
        assert_eq!(
            plan.updates,
            vec![Field {
                id: "f1".into(),
                label: "Headline".into(),
                order: 1,
                is_required: true,
            }]
        );
    }
}
