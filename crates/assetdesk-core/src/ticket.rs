//! # Helpdesk Tickets
//!
//! Public ticket submissions. Every missing contact field is reported at
//! once so the form can show all messages together.

use crate::primitives::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH};
use crate::{DeskError, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw form fields as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketForm {
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
}

/// A field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl TicketForm {
    /// All field errors, in form order. Empty when the form is valid.
    #[must_use]
    pub fn check(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for (field, label, value) in [
            ("contact_name", "Name", &self.contact_name),
            ("email", "Email", &self.email),
            ("mobile", "Mobile", &self.mobile),
        ] {
            let value = value.trim();
            if value.is_empty() {
                errors.push(FieldError {
                    field,
                    message: format!("{} is Required.", label),
                });
            } else if value.len() > MAX_NAME_LENGTH {
                errors.push(FieldError {
                    field,
                    message: format!("{} is too long.", label),
                });
            }
        }
        if !self.email.trim().is_empty() && !self.email.contains('@') {
            errors.push(FieldError {
                field: "email",
                message: "Email is not valid.".to_string(),
            });
        }
        for (field, value) in [("subject", &self.subject), ("description", &self.description)] {
            if value.as_ref().is_some_and(|v| v.len() > MAX_TEXT_LENGTH) {
                errors.push(FieldError {
                    field,
                    message: format!("{} is too long.", field),
                });
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    New,
    InProgress,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: RecordId,
    pub reference: String,
    pub contact_name: String,
    pub email: String,
    pub mobile: String,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub priority: u8,
    pub state: TicketState,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Build a ticket from a valid form. An invalid form fails with every
    /// message joined by newlines.
    pub fn from_form(
        id: RecordId,
        reference: String,
        form: TicketForm,
        now: DateTime<Utc>,
    ) -> Result<Self, DeskError> {
        let errors = form.check();
        if !errors.is_empty() {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("\n");
            return Err(DeskError::Validation(message));
        }
        let trimmed = |s: Option<String>| {
            s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };
        Ok(Self {
            id,
            reference,
            contact_name: form.contact_name.trim().to_string(),
            email: form.email.trim().to_string(),
            mobile: form.mobile.trim().to_string(),
            subject: trimmed(form.subject),
            description: trimmed(form.description),
            priority: form.priority.unwrap_or(0).min(3),
            state: TicketState::New,
            created_at: now,
        })
    }
}
