use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use lettre::transport::stub::AsyncStubTransport;
use once_cell::sync::Lazy;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use contact_relay::email_client::EmailClient;
use contact_relay::{configuration, startup, telemetry};

pub const PAGE_ID: &str = "59833787-2cf9-4fdf-8782-e53db20768a5";

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber =
            telemetry::get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        telemetry::initialize_subscriber(subscriber);
    } else {
        let subscriber =
            telemetry::get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        telemetry::initialize_subscriber(subscriber);
    };
});

pub struct App {
    pub address: SocketAddr,
    pub client: Client,
    pub notion_server: MockServer,
    pub email_transport: AsyncStubTransport,
}

impl App {
    pub async fn new() -> Self {
        App::with_email_transport(AsyncStubTransport::new_ok()).await
    }

    pub async fn with_email_transport(email_transport: AsyncStubTransport) -> Self {
        App::spawn(email_transport, None).await
    }

    /// Like `new`, but Notion calls go to `notion_base_url` instead of the mock server.
    pub async fn with_notion_base_url(notion_base_url: String) -> Self {
        App::spawn(AsyncStubTransport::new_ok(), Some(notion_base_url)).await
    }

    async fn spawn(email_transport: AsyncStubTransport, notion_base_url: Option<String>) -> Self {
        Lazy::force(&TRACING);

        // configure listener
        let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("Failed to start an test application");
        let address = listener.local_addr().unwrap();

        // run notion server
        let notion_server = MockServer::start().await;

        // point configuration at the mock server
        let mut configuration =
            configuration::get_configuration().expect("Failed to read configuration");
        configuration.notion.base_url = notion_base_url.unwrap_or_else(|| notion_server.uri());

        // configure app state, recording emails instead of sending them
        let mut app_state =
            startup::get_app_state(&configuration).expect("Failed to build application state");
        app_state.email_client =
            EmailClient::stub(&configuration.email_client, email_transport.clone())
                .expect("Failed to build stub email client");

        // start a server
        tokio::spawn(startup::run(listener, app_state));

        // provide a reqwest client
        let client = Client::new();

        App {
            address,
            client,
            notion_server,
            email_transport,
        }
    }
}

impl App {
    pub fn build_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("http://{}{}", self.address, path);

        self.client.request(method, url)
    }

    pub async fn get_health_check(&self) -> Response {
        self.build_request(Method::GET, "/health_check")
            .send()
            .await
            .unwrap()
    }

    pub async fn post_submission(&self, body: &serde_json::Value) -> Response {
        self.build_request(Method::POST, "/")
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_submission_form<T: Serialize + ?Sized>(&self, parameter: &T) -> Response {
        self.build_request(Method::POST, "/")
            .form(parameter)
            .send()
            .await
            .unwrap()
    }

    pub async fn emails_sent(&self) -> usize {
        self.email_transport.messages().await.len()
    }

    pub async fn notion_requests(&self) -> Vec<serde_json::Value> {
        self.notion_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

/// Base URL of a local port nothing listens on.
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
        .expect("Failed to reserve a port");
    let address = listener.local_addr().unwrap();
    drop(listener);

    format!("http://{}", address)
}

pub fn page_created() -> Mock {
    Mock::given(path("/v1/pages"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "page",
            "id": PAGE_ID,
        })))
}

pub fn valid_submission() -> serde_json::Value {
    serde_json::json!({
        "name": "Jane Doe",
        "email": "jane@example.com",
        "service": "Consultation",
        "message": "Hi\nI'd like to talk",
    })
}
