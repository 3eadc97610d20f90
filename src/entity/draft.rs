//! Entity drafts and their normalization
//!
//! Form input is cleaned before any check runs, so uniqueness is decided on
//! the stored spelling.

use crate::domain::ports::{BusinessEntity, CityRef, EntityId, EntityKind, TenantId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_active() -> bool {
    true
}

/// Submitted fields of a business entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDraft {
    pub kind: EntityKind,
    pub name: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub trade_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl EntityDraft {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            identifier: None,
            trade_name: None,
            address: None,
            contact: None,
            email: None,
            phone: None,
            active: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Clean and validate the draft
    ///
    /// Free-text fields are trimmed and title-cased, the email is
    /// lower-cased and the identifier trimmed. Blank optional fields become
    /// `None`.
    pub fn normalized(self) -> Result<Self> {
        let name = title_case(self.name.trim());
        if name.is_empty() {
            return Err(Error::Validation {
                field: "name",
                message: "must not be empty".into(),
            });
        }

        let identifier = trimmed(self.identifier);
        if self.kind == EntityKind::Counterparty && identifier.is_none() {
            return Err(Error::Validation {
                field: "identifier",
                message: "is required".into(),
            });
        }

        let email = trimmed(self.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(Error::Validation {
                    field: "email",
                    message: format!("'{}' is not an email address", email),
                });
            }
        }

        Ok(Self {
            kind: self.kind,
            name,
            identifier,
            trade_name: trimmed(self.trade_name).map(|v| title_case(&v)),
            address: trimmed(self.address).map(|v| title_case(&v)),
            contact: trimmed(self.contact).map(|v| title_case(&v)),
            email,
            phone: trimmed(self.phone),
            active: self.active,
        })
    }

    /// Build the stored row
    pub fn into_entity(
        self,
        id: EntityId,
        tenant_id: TenantId,
        city: Option<CityRef>,
        created_at: DateTime<Utc>,
    ) -> BusinessEntity {
        BusinessEntity {
            id,
            tenant_id,
            kind: self.kind,
            name: self.name,
            identifier: self.identifier,
            trade_name: self.trade_name,
            address: self.address,
            contact: self.contact,
            email: self.email,
            phone: self.phone,
            city,
            active: self.active,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Upper-case the first letter of every word, lower-case the rest
///
/// A word starts after any non-alphabetic character, so `s.a.` becomes
/// `S.A.` and `o'neil` becomes `O'Neil`.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}
