use std::sync::Arc;

use signal_trader::chat::listener::run_listener;
use signal_trader::chat::{ChatEvent, StatusSink, TelegramClient};
use signal_trader::config::AppConfig;
use signal_trader::exchange::http::build_client;
use signal_trader::execution::Dispatcher;
use signal_trader::parser::SignalParser;
use signal_trader::services::SignalHandler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    signal_trader::metrics::init_metrics(config.metrics_addr)?;
    if let Some(addr) = config.metrics_addr {
        tracing::info!("Metrics listening on {addr}");
    }

    // --- Exchange + dispatcher ---
    let exchange = config.exchange.connect(
        config.credentials(),
        config.http_timeout,
        config.exchange_base_url.clone(),
    )?;
    let dispatch_config = config.dispatch_config();
    tracing::info!(
        exchange = %config.exchange,
        sizing = %dispatch_config.sizing,
        default_leverage = config.default_leverage,
        retries = dispatch_config.retry.max_retries,
        dry_run = dispatch_config.dry_run,
        "Dispatcher configured"
    );
    if dispatch_config.dry_run {
        tracing::warn!("DRY_RUN is set, orders will be sized but not submitted");
    }
    let dispatcher = Dispatcher::new(exchange, dispatch_config);

    // --- Chat ---
    let telegram = Arc::new(TelegramClient::new(
        build_client(config.http_timeout)?,
        config.telegram_bot_token.clone(),
    ));
    let me = telegram.get_me().await?;
    tracing::info!(
        bot_id = me.id,
        username = me.username.as_deref().unwrap_or("-"),
        channel = %config.signal_chat_id,
        "Connected to Telegram"
    );

    let handler = Arc::new(
        SignalHandler::new(
            SignalParser::new(config.parser_config()),
            config.signal_policy(),
            dispatcher,
            config.signal_chat_id.clone(),
        )
        .with_self_id(me.id.to_string()),
    );

    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<ChatEvent>(256);
    let listener_client = Arc::clone(&telegram);
    tokio::spawn(async move {
        run_listener(listener_client, event_tx).await;
    });

    let sink: Arc<dyn StatusSink> = telegram;
    handler.run(event_rx, sink).await;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}
