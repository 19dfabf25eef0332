use std::fmt::Debug;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::domain::ContactSubmission;

/// Longest `content` Notion accepts in a single rich text object.
const MAX_TEXT_CONTENT_CHARS: usize = 2000;

/// Status given to every page created from a submission.
pub const NEW_STATUS: &str = "New";

#[derive(Clone)]
pub struct NotionClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
    database_id: String,
    notion_version: String,
}

impl NotionClient {
    pub fn new(
        base_url: String,
        api_key: Secret<String>,
        database_id: String,
        notion_version: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
            database_id,
            notion_version,
        })
    }

    #[tracing::instrument(
        name = "Creating a Notion page for a contact submission",
        skip(self, submission),
        fields(database_id = %self.database_id)
    )]
    pub async fn create_page(
        &self,
        submission: &ContactSubmission,
    ) -> Result<CreatedPage, NotionError> {
        let url = format!("{}/v1/pages", self.base_url);
        let request_body = CreatePageRequest::new(&self.database_id, submission);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header("Notion-Version", &self.notion_version)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(NotionError::from_error_body(status, body));
        }

        let page: PageResponse = response.json().await?;
        tracing::info!(page_id = %page.id, "Notion page created");

        Ok(CreatedPage { id: page.id })
    }
}

/// A page the store accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPage {
    pub id: String,
}

impl CreatedPage {
    pub fn url(&self) -> String {
        format!("https://notion.so/{}", self.id.replace('-', ""))
    }
}

#[derive(Deserialize)]
struct PageResponse {
    id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct CreatePageRequest<'a> {
    parent: Parent<'a>,
    properties: Properties<'a>,
}

impl<'a> CreatePageRequest<'a> {
    fn new(database_id: &'a str, submission: &'a ContactSubmission) -> Self {
        Self {
            parent: Parent { database_id },
            properties: Properties {
                name: TitleProperty {
                    title: rich_text_segments(submission.name.as_ref()),
                },
                email: EmailProperty {
                    email: submission.email.as_ref(),
                },
                service: SelectProperty::new(submission.service.as_ref()),
                message: RichTextProperty {
                    rich_text: rich_text_segments(submission.message.as_ref()),
                },
                status: SelectProperty::new(NEW_STATUS),
            },
        }
    }
}

#[derive(Serialize)]
struct Parent<'a> {
    database_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Properties<'a> {
    name: TitleProperty<'a>,
    email: EmailProperty<'a>,
    service: SelectProperty<'a>,
    message: RichTextProperty<'a>,
    status: SelectProperty<'a>,
}

#[derive(Serialize)]
struct TitleProperty<'a> {
    title: Vec<RichText<'a>>,
}

#[derive(Serialize)]
struct EmailProperty<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SelectProperty<'a> {
    select: SelectOption<'a>,
}

impl<'a> SelectProperty<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            select: SelectOption { name },
        }
    }
}

#[derive(Serialize)]
struct SelectOption<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct RichTextProperty<'a> {
    rich_text: Vec<RichText<'a>>,
}

#[derive(Serialize)]
struct RichText<'a> {
    text: TextContent<'a>,
}

impl<'a> RichText<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            text: TextContent { content },
        }
    }
}

#[derive(Serialize)]
struct TextContent<'a> {
    content: &'a str,
}

fn rich_text_segments(text: &str) -> Vec<RichText<'_>> {
    split_text_content(text)
        .into_iter()
        .map(RichText::new)
        .collect()
}

/// Split `text` into consecutive slices of at most `MAX_TEXT_CONTENT_CHARS`
/// characters, never cutting through a character.
fn split_text_content(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(MAX_TEXT_CONTENT_CHARS)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }

    chunks
}

#[derive(thiserror::Error)]
pub enum NotionError {
    #[error("Failed to reach the Notion API")]
    Request(#[from] reqwest::Error),
    #[error("{message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },
    #[error("Notion API responded with {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

impl NotionError {
    fn from_error_body(status: StatusCode, body: String) -> Self {
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => NotionError::Api {
                status,
                code: error.code,
                message: error.message,
            },
            Err(_) => NotionError::UnexpectedStatus { status, body },
        }
    }

    /// Text reported to the caller alongside a failed submission.
    pub fn details(&self) -> String {
        match self {
            NotionError::Request(e) => e.to_string(),
            _ => self.to_string(),
        }
    }
}

impl Debug for NotionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::error_chain_fmt(self, f)
    }
}
