//! # Helpdesk Form
//!
//! The public ticket form. Both routes answer with HTML; every value echoed
//! back to the page is escaped.

use super::AppState;
use super::handlers::status_for;
use assetdesk_core::ticket::{FieldError, TicketForm};
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;

/// Raw form fields. Browsers send empty strings for untouched inputs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HelpdeskForm {
    pub contact_name: String,
    pub email: String,
    pub mobile: String,
    pub subject: String,
    pub description: String,
    pub priority: String,
}

impl HelpdeskForm {
    fn to_ticket_form(&self) -> TicketForm {
        let optional = |v: &str| Some(v.trim().to_string()).filter(|v| !v.is_empty());
        TicketForm {
            contact_name: self.contact_name.clone(),
            email: self.email.clone(),
            mobile: self.mobile.clone(),
            subject: optional(&self.subject),
            description: optional(&self.description),
            priority: self.priority.trim().parse().ok(),
        }
    }
}

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>\n",
        escape_html(title),
        escape_html(title),
        body
    )
}

fn render_form(values: &HelpdeskForm, errors: &[FieldError]) -> String {
    let mut body = String::new();
    if !errors.is_empty() {
        body.push_str("<ul class=\"errors\">\n");
        for error in errors {
            body.push_str(&format!(
                "<li data-field=\"{}\">{}</li>\n",
                error.field,
                escape_html(&error.message)
            ));
        }
        body.push_str("</ul>\n");
    }

    body.push_str("<form method=\"post\" action=\"/helpdesk/ticket\">\n");
    for (name, label, value) in [
        ("contact_name", "Name", &values.contact_name),
        ("email", "Email", &values.email),
        ("mobile", "Mobile", &values.mobile),
        ("subject", "Subject", &values.subject),
    ] {
        body.push_str(&format!(
            "<label>{label} <input name=\"{name}\" value=\"{}\"></label><br>\n",
            escape_html(value)
        ));
    }
    body.push_str(&format!(
        "<label>Description <textarea name=\"description\">{}</textarea></label><br>\n",
        escape_html(&values.description)
    ));
    body.push_str("<label>Priority <select name=\"priority\">\n");
    for (value, label) in [("0", "Low"), ("1", "Normal"), ("2", "High"), ("3", "Urgent")] {
        let selected = if values.priority.trim() == value {
            " selected"
        } else {
            ""
        };
        body.push_str(&format!(
            "<option value=\"{value}\"{selected}>{label}</option>\n"
        ));
    }
    body.push_str("</select></label><br>\n<button type=\"submit\">Submit</button>\n</form>");
    page("Helpdesk", &body)
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn form_handler() -> Html<String> {
    Html(render_form(&HelpdeskForm::default(), &[]))
}

/// Create a ticket, or re-render the form with every field error.
pub async fn submit_handler(
    State(state): State<AppState>,
    Form(values): Form<HelpdeskForm>,
) -> Response {
    let form = values.to_ticket_form();
    let errors = form.check();
    if !errors.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(render_form(&values, &errors)),
        )
            .into_response();
    }

    match state
        .mutate(move |desk| desk.submit_ticket(Utc::now(), form))
        .await
    {
        Ok(ticket) => {
            tracing::info!(ticket = %ticket.reference, "Helpdesk ticket received");
            let body = format!(
                "<p>Thank you, {}. Your ticket reference is <strong>{}</strong>.</p>",
                escape_html(&ticket.contact_name),
                escape_html(&ticket.reference)
            );
            Html(page("Ticket received", &body)).into_response()
        }
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                tracing::error!(error = %e, "Helpdesk ticket could not be stored");
                let body = "<p>Your ticket could not be saved. Please try again later.</p>";
                (status, Html(page("Helpdesk", body))).into_response()
            } else {
                let body = format!("<p>{}</p>", escape_html(&e.to_string()));
                (status, Html(page("Helpdesk", &body))).into_response()
            }
        }
    }
}
