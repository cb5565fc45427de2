use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// Validated email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if !trimmed.contains('@') {
            return Err(DomainError::InvalidEmail);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub provider: String,
    pub provider_account_id: String,
    pub thumbnail: Option<String>,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Owner details embedded in template and note responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub thumbnail: Option<String>,
}

/// Identity payload forwarded by the caller after OAuth sign-in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuthAccountInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub provider: String,
    pub provider_account_id: String,
    pub thumbnail: Option<String>,
}

impl OAuthAccountInput {
    /// Identity providers hand over a single display name; it is stored as
    /// the first name.
    pub fn from_display_name(
        email: &str,
        name: &str,
        provider: &str,
        provider_account_id: &str,
        thumbnail: Option<String>,
    ) -> Self {
        Self {
            email: email.to_string(),
            first_name: name.to_string(),
            last_name: String::new(),
            provider: provider.to_string(),
            provider_account_id: provider_account_id.to_string(),
            thumbnail,
        }
    }
}

/// Profile fields checked before any insert or update.
pub struct ProfileRef<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub provider: &'a str,
    pub provider_account_id: &'a str,
}

impl<'a> From<&'a OAuthAccountInput> for ProfileRef<'a> {
    fn from(input: &'a OAuthAccountInput) -> Self {
        Self {
            first_name: &input.first_name,
            last_name: &input.last_name,
            provider: &input.provider,
            provider_account_id: &input.provider_account_id,
        }
    }
}

impl<'a> From<&'a Account> for ProfileRef<'a> {
    fn from(account: &'a Account) -> Self {
        Self {
            first_name: &account.first_name,
            last_name: &account.last_name,
            provider: &account.provider,
            provider_account_id: &account.provider_account_id,
        }
    }
}

pub fn validate<'a>(profile: impl Into<ProfileRef<'a>>) -> DomainResult<()> {
    let p = profile.into();
    if p.first_name.trim().is_empty() && p.last_name.trim().is_empty() {
        return Err(DomainError::InvalidName);
    }
    if p.provider.trim().is_empty() {
        return Err(DomainError::ProviderRequired);
    }
    if p.provider_account_id.trim().is_empty() {
        return Err(DomainError::ProviderAccountRequired);
    }
    Ok(())
}

/// Merge the latest identity payload into a stored account on repeat login.
/// Blank input values never erase stored ones.
pub fn update_profile(mut current: Account, input: &OAuthAccountInput) -> DomainResult<Account> {
    current.email = Email::parse(&input.email)?;
    if !input.provider.is_empty() {
        current.provider = input.provider.clone();
    }
    if !input.provider_account_id.is_empty() {
        current.provider_account_id = input.provider_account_id.clone();
    }
    if !input.first_name.is_empty() {
        current.first_name = input.first_name.clone();
    }
    if !input.last_name.is_empty() {
        current.last_name = input.last_name.clone();
    }
    if let Some(thumb) = &input.thumbnail {
        current.thumbnail = Some(thumb.clone());
    }
    validate(&current)?;
    Ok(current)
}
