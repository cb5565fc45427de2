//! Domain types and rules shared by the mini-notion backend.
//!
//! Nothing in this crate touches storage or HTTP. Functions take plain
//! values and return a [`DomainError`] describing the first rule broken.

pub mod account;
pub mod errors;
pub mod note;
pub mod template;

pub use account::{Account, Email, OAuthAccountInput, OwnerSummary};
pub use errors::{DomainError, DomainResult, ErrorKind};
pub use note::{Note, NoteFilters, NoteStatus, NoteWithMeta, Section, SectionUpdate, SectionWithField};
pub use template::{Field, FieldDraft, FieldPlan, Template, TemplateFilters, TemplateWithUsage};
