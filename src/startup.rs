use axum::{
    extract::{FromRef, MatchedPath},
    http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue, Request},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::configuration::Settings;
use crate::email_client::EmailClient;
use crate::notion_client::NotionClient;
use crate::routes::{check_health, method_not_allowed, preflight, submit};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub notion_client: NotionClient,
    pub email_client: EmailClient,
}

pub fn get_app_state(configuration: &Settings) -> anyhow::Result<AppState> {
    let notion = &configuration.notion;
    let notion_client = NotionClient::new(
        notion.base_url.clone(),
        notion.api_key.clone(),
        notion.database_id.clone(),
        notion.version.clone(),
        notion.timeout(),
    )?;
    let email_client = EmailClient::new(&configuration.email_client)?;

    Ok(AppState {
        notion_client,
        email_client,
    })
}

pub async fn run(listener: TcpListener, app_state: AppState) {
    let app = router(app_state);

    axum::serve(listener, app)
        .await
        .expect("Failed to start up the application");
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            post(submit)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .with_state(app_state)
        .route("/health_check", get(check_health))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(
            // Refer to https://github.com/tokio-rs/axum/blob/main/examples/tracing-aka-logging/Cargo.toml
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let path = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str);
                tracing::info_span!(
                    "Starting HTTP request",
                    method = ?request.method(),
                    path,
                    request_id = %Uuid::new_v4(),
                )
            }),
        )
}
