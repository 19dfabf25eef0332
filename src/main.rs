use tokio::net::TcpListener;

use contact_relay::{configuration, startup, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = telemetry::get_subscriber(
        "contact-relay".to_string(),
        "info".to_string(),
        std::io::stdout,
    );
    telemetry::initialize_subscriber(subscriber);

    let configuration = configuration::get_configuration()?;
    let app_state = startup::get_app_state(&configuration)?;

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(%address, "Listening for contact submissions");

    startup::run(listener, app_state).await;

    Ok(())
}
