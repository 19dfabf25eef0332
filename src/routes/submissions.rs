use std::fmt::Debug;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, CONTENT_TYPE,
};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::{ContactSubmission, RequiredField};
use crate::email_client::EmailClient;
use crate::notion_client::{NotionClient, NotionError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Default, Deserialize)]
pub struct FormData {
    name: Option<String>,
    email: Option<String>,
    service: Option<String>,
    message: Option<String>,
}

impl FormData {
    /// Decode a urlencoded body when the request says so, JSON otherwise.
    pub fn decode(headers: &HeaderMap, body: &[u8]) -> Result<Self, SubmitError> {
        let is_form = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false);

        if is_form {
            serde_urlencoded::from_bytes(body)
                .map_err(|e| SubmitError::ValidationError(e.to_string()))
        } else {
            serde_json::from_slice(body).map_err(|e| SubmitError::ValidationError(e.to_string()))
        }
    }
}

impl TryFrom<FormData> for ContactSubmission {
    type Error = SubmitError;

    fn try_from(data: FormData) -> Result<Self, Self::Error> {
        let field = |label: &str, value: Option<String>| {
            RequiredField::parse(label, value).map_err(SubmitError::ValidationError)
        };

        Ok(Self {
            name: field("name", data.name)?,
            email: field("email", data.email)?,
            service: field("service", data.service)?,
            message: field("message", data.message)?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    success: bool,
    message: &'static str,
    notion_url: String,
}

#[tracing::instrument(
    name = "Handling a contact form submission",
    skip(notion_client, email_client, headers, body),
    fields(
        submitter_name = tracing::field::Empty,
        submitter_email = tracing::field::Empty,
        service = tracing::field::Empty,
    )
)]
pub async fn submit(
    State(notion_client): State<NotionClient>,
    State(email_client): State<EmailClient>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResponse>, SubmitError> {
    let submission: ContactSubmission = FormData::decode(&headers, &body)?.try_into()?;

    let span = tracing::Span::current();
    span.record("submitter_name", &tracing::field::display(&submission.name));
    span.record("submitter_email", &tracing::field::display(&submission.email));
    span.record("service", &tracing::field::display(&submission.service));

    let page = notion_client
        .create_page(&submission)
        .await
        .map_err(SubmitError::StoreError)?;
    let page_url = page.url();

    if let Err(error) = email_client.send_notification(&submission, &page_url).await {
        tracing::error!(
            error.cause_chain = ?error,
            error.message = %error,
            page_url = %page_url,
            "Submission notification failed, the Notion page was created regardless",
        );
    }

    Ok(Json(SubmitResponse {
        success: true,
        message: "Form submitted successfully",
        notion_url: page_url,
    }))
}

/// CORS preflight. The allow-origin header is added for every route by the router.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
        ],
    )
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
}

#[derive(thiserror::Error)]
pub enum SubmitError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Failed to store the submission in Notion")]
    StoreError(#[source] NotionError),
}

impl Debug for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SubmitError::ValidationError(ref reason) => {
                tracing::info!(reason = %reason, "Rejecting an incomplete submission");

                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": "All fields are required" })),
                )
            }
            SubmitError::StoreError(ref error) => {
                tracing::error!("{:?}", self);

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "error": "Internal server error",
                        "details": error.details(),
                    })),
                )
            }
        }
        .into_response()
    }
}
