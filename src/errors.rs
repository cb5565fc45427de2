//! Typed error hierarchy for the backend.
//!
//! Domain rules report [`DomainError`]; storage code reports `anyhow::Error`
//! with context. `NotionError` carries either one up to the HTTP layer.

use mini_notion_common::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotionError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type NotionResult<T> = Result<T, NotionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_converts_with_question_mark() {
        fn fails() -> NotionResult<()> {
            let rule: Result<(), DomainError> = Err(DomainError::TemplateInUse);
            rule?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, NotionError::Domain(DomainError::TemplateInUse)));
    }

    #[test]
    fn anyhow_error_becomes_other() {
        let err: NotionError = anyhow::anyhow!("disk full").into();
        assert!(matches!(err, NotionError::Other(_)));
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn domain_display_is_transparent() {
        let err = NotionError::from(DomainError::TitleRequired);
        assert_eq!(err.to_string(), "title is required");
    }
}
