use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::info;
use rustls::crypto::{CryptoProvider, ring};

use ticker_rest_multi_poller::{
    config::Config,
    error::ConfigError,
    exchanges::get_adapter,
    poller::PollManager,
    queue::{self, TickerReceiver},
    schema::Ticker,
};

/// How often the consumer thread drains the ticker queue.
const CONSUME_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "ticker-rest-multi-poller", version, about = "Polls exchange REST ticker endpoints on a fixed schedule")]
struct Args {
    /// Path to the portfolio configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize logging and the cryptography backend (rustls)
// - Load and validate the portfolio configuration
// - Start the poll manager on its reactor thread
// - Consume and display records until shutdown
//
fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // --------------------------------------------------------
    // IMPORTANT:
    // rustls >= 0.23 requires an explicit CryptoProvider
    // installation. This must be executed exactly once and
    // as early as possible in the process lifecycle.
    //
    // Using the `ring` provider for performance and stability.
    // --------------------------------------------------------
    CryptoProvider::install_default(ring::default_provider())
        .expect("failed to install rustls CryptoProvider");

    // --------------------------------------------------------
    // Load configuration from disk
    // --------------------------------------------------------
    let config = Config::load(&args.config)?;

    info!(
        "tracking {} coins against {} on {}",
        config.portfolio.len(),
        config.base_coin(),
        config.exchange()
    );
    for holding in &config.portfolio {
        info!("{} -> {}", holding.coin, holding.quantity);
    }

    let adapter = get_adapter(config.exchange())
        .ok_or_else(|| ConfigError::UnknownExchange(config.exchange().to_string()))?;
    let targets = config.poll_targets(adapter.as_ref());

    // --------------------------------------------------------
    // Start the poll manager
    //
    // All polling I/O runs on one dedicated reactor thread.
    // The main thread keeps the consuming side: it drains the
    // queue and prints every record.
    // --------------------------------------------------------
    let (queue_tx, mut queue_rx) = queue::bounded(config.queue_capacity());
    let manager = PollManager::new(targets, adapter, config.poll_interval(), queue_tx)?;
    let handle = manager.start()?;

    while !handle.stop_requested() {
        while let Some(ticker) = queue_rx.try_pop() {
            display(&ticker);
        }
        thread::sleep(CONSUME_INTERVAL);
    }

    // --------------------------------------------------------
    // Shutdown: join the reactor, then drain whatever the grace
    // window still produced
    // --------------------------------------------------------
    handle.join();
    drain_remaining(&mut queue_rx);

    info!("done");
    Ok(())
}

fn display(ticker: &Ticker) {
    println!(
        "[{}] {}  close {}  high {}  low {}  volume {}",
        ticker.observed_at.format("%H:%M:%S"),
        ticker.symbol,
        ticker.close,
        ticker.high,
        ticker.low,
        ticker.volume
    );
}

fn drain_remaining(queue: &mut TickerReceiver) {
    while let Some(ticker) = queue.try_pop() {
        display(&ticker);
    }
}
