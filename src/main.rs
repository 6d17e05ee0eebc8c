use anyhow::Context;
use book_outlet::App;
use outlet_kernel::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load book outlet settings")?;
    outlet_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "book outlet bootstrap starting"
    );

    App::build(settings).await?.serve().await
}
