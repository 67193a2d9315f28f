use alerter::TelegramAlerter;
use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::load_config;
use core_types::{Category, OrderRequest, OrderSide};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use trade_client::{LogNotifier, NotificationSink, TradeChannel, TradeClient};

/// The main entry point for the Bybit trade-channel client.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse first so `--help` and usage errors never need credentials.
    let cli = Cli::parse();

    // A .env file is optional; real environment variables work just as well.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("No .env file loaded: {e}");
    }

    let settings = load_config().context("Failed to load configuration")?;
    let _log_guard = configuration::init_tracing(&settings.logging);
    settings.validate().context("Invalid configuration")?;

    let notifier: Arc<dyn NotificationSink> = match TelegramAlerter::new(&settings.telegram) {
        Some(alerter) => Arc::new(alerter),
        None => Arc::new(LogNotifier),
    };

    tracing::info!(
        endpoint = %settings.trade_ws.endpoint_url(),
        credentials = ?settings.bybit,
        "Starting Bybit trade client."
    );
    let client = TradeClient::new(&settings.bybit, &settings.trade_ws, Some(notifier));

    match cli.command {
        Commands::Listen => handle_listen(&client).await,
        Commands::Order(args) => handle_order(&client, args).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Places orders over Bybit's private trade WebSocket.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, authenticate and print every frame the client does not consume, until Ctrl-C.
    Listen,
    /// Place a single order and print the exchange's answer.
    Order(OrderArgs),
}

#[derive(Parser)]
struct OrderArgs {
    /// The symbol to trade (e.g., "BTCUSDT").
    #[arg(long)]
    symbol: String,

    /// "buy" or "sell".
    #[arg(long)]
    side: OrderSide,

    /// Order quantity in base units.
    #[arg(long)]
    qty: Decimal,

    /// Limit price. Without it the order is a market order.
    #[arg(long)]
    price: Option<Decimal>,

    /// Only reduce an existing position.
    #[arg(long)]
    reduce_only: bool,

    /// Product category: linear, spot, option or inverse.
    #[arg(long, default_value = "linear")]
    category: Category,
}

impl OrderArgs {
    fn to_request(&self) -> OrderRequest {
        let order = match self.price {
            Some(price) => OrderRequest::limit(&self.symbol, self.side, self.qty, price),
            None => OrderRequest::market(&self.symbol, self.side, self.qty),
        }
        .with_category(self.category);

        if self.reduce_only { order.reduce_only() } else { order }
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_listen(client: &TradeClient) -> anyhow::Result<()> {
    let mut frames = client.subscribe();
    client.connect().await.context("Failed to connect to the trade channel")?;
    println!("Connected. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = frames.recv() => match frame {
                Ok(frame) => println!("{}", serde_json::to_string_pretty(&frame)?),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Listener lagged, skipped {} frames.", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    client.disconnect().await;
    println!("Disconnected.");
    Ok(())
}

async fn handle_order(channel: &dyn TradeChannel, args: OrderArgs) -> anyhow::Result<()> {
    let order = args.to_request();
    println!(
        "Placing {:?} {:?} order for {} {} ({:?})",
        order.order_type, order.side, order.qty, order.symbol, order.category
    );

    channel.connect().await.context("Failed to connect to the trade channel")?;
    let outcome = channel.submit_order(order).await;
    channel.disconnect().await;

    let result = outcome.context("Order was not acknowledged")?;
    match result.error_text() {
        None => {
            println!(
                "Order accepted: {}",
                result.order_id.as_deref().unwrap_or("<no order id>")
            );
            Ok(())
        }
        Some(error) => anyhow::bail!("Order rejected: {error}"),
    }
}
