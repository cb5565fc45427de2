//! Domain error values.
//!
//! Every rule violation maps to exactly one `DomainError` variant. The
//! variant carries a stable upper-snake `code()` that API clients match on,
//! a coarse `kind()` used to pick the HTTP status, and a `user_message()`
//! suitable for showing directly in a form.

use thiserror::Error;

/// Coarse classification of a domain error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    BadRequest,
    Conflict,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("unauthorized")]
    Unauthorized,

    #[error("template is used by notes")]
    TemplateInUse,

    #[error("template field is referenced by notes and cannot be removed")]
    TemplateFieldInUse,

    #[error("template structure is locked because notes use it")]
    TemplateStructureLocked,

    #[error("invalid status")]
    InvalidStatus,

    #[error("invalid template field")]
    InvalidTemplateField,

    #[error("template name is required")]
    TemplateNameRequired,

    #[error("template name must be at most {max} characters")]
    TemplateNameTooLong { max: usize },

    #[error("template owner is required")]
    TemplateOwnerRequired,

    #[error("template requires at least one field")]
    FieldRequired,

    #[error("field order must be greater than zero and unique")]
    FieldOrderInvalid,

    #[error("field label is required")]
    FieldLabelRequired,

    #[error("field label must be at most {max} characters")]
    FieldLabelTooLong { max: usize },

    #[error("sections do not match template fields")]
    SectionsMissing,

    #[error("required field content is empty")]
    RequiredFieldEmpty,

    #[error("title is required")]
    TitleRequired,

    #[error("title must be at most {max} characters")]
    TitleTooLong { max: usize },

    #[error("owner is required")]
    OwnerRequired,

    #[error("invalid email")]
    InvalidEmail,

    #[error("first or last name is required")]
    InvalidName,

    #[error("provider is required")]
    ProviderRequired,

    #[error("provider account id is required")]
    ProviderAccountRequired,
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::TemplateInUse => "TEMPLATE_IN_USE",
            Self::TemplateFieldInUse => "TEMPLATE_FIELD_IN_USE",
            Self::TemplateStructureLocked => "TEMPLATE_STRUCTURE_LOCKED",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::InvalidTemplateField => "INVALID_TEMPLATE_FIELD",
            Self::TemplateNameRequired => "TEMPLATE_NAME_REQUIRED",
            Self::TemplateNameTooLong { .. } => "TEMPLATE_NAME_TOO_LONG",
            Self::TemplateOwnerRequired => "TEMPLATE_OWNER_REQUIRED",
            Self::FieldRequired => "FIELD_REQUIRED",
            Self::FieldOrderInvalid => "FIELD_ORDER_INVALID",
            Self::FieldLabelRequired => "FIELD_LABEL_REQUIRED",
            Self::FieldLabelTooLong { .. } => "FIELD_LABEL_TOO_LONG",
            Self::SectionsMissing => "SECTIONS_MISSING",
            Self::RequiredFieldEmpty => "REQUIRED_FIELD_EMPTY",
            Self::TitleRequired => "TITLE_REQUIRED",
            Self::TitleTooLong { .. } => "TITLE_TOO_LONG",
            Self::OwnerRequired => "OWNER_REQUIRED",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidName => "INVALID_NAME",
            Self::ProviderRequired => "PROVIDER_REQUIRED",
            Self::ProviderAccountRequired => "PROVIDER_ACCOUNT_REQUIRED",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized => ErrorKind::Forbidden,
            Self::TemplateInUse | Self::TemplateFieldInUse | Self::TemplateStructureLocked => {
                ErrorKind::Conflict
            }
            _ => ErrorKind::BadRequest,
        }
    }

    /// Text meant for end users. Falls back to the `Display` text for
    /// validation errors whose wording is already user-facing.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { entity } => format!("The requested {} does not exist.", entity),
            Self::Unauthorized => "You are not allowed to modify this resource.".to_string(),
            Self::TemplateInUse => {
                "This template cannot be deleted because notes use it.".to_string()
            }
            Self::TemplateFieldInUse | Self::TemplateStructureLocked => {
                "Template fields cannot be changed or removed because notes use this template."
                    .to_string()
            }
            other => {
                let mut msg = other.to_string();
                if let Some(first) = msg.get(0..1) {
                    let upper = first.to_uppercase();
                    msg.replace_range(0..1, &upper);
                }
                msg.push('.');
                msg
            }
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
