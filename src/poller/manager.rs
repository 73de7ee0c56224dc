use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use anyhow::Context;
use log::{error, info};
use rustls::ClientConfig;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tokio::time::{Duration, sleep};

use crate::{
    config::PollTarget,
    error::ConfigError,
    exchanges::adapter::ExchangeAdapter,
    metrics::METRICS,
    poller::client::ScheduledClient,
    queue::TickerSender,
    tls,
};

/// How long in-flight cycles keep running after a stop request
/// before the reactor is torn down.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// How often the reactor writes a metrics summary line.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Owns every scheduled client and the thread their reactor runs on.
///
/// RESPONSIBILITIES:
/// - Build one client per poll target, all sharing one TLS
///   configuration and one queue handle
/// - Run the clients on a single dedicated reactor thread
/// - Wind down on request or on Ctrl-C, giving in-flight cycles a
///   short grace window
///
/// THREADING MODEL:
/// - All polling I/O is cooperatively scheduled on ONE thread. A
///   current-thread runtime plus LocalSet keeps it that way; adding
///   endpoints adds tasks, not threads.
/// - Clients are moved into the reactor at start. After that the
///   manager side holds no reference to them; the handle only
///   carries the stop signal.
pub struct PollManager {
    clients: Vec<ScheduledClient>,
    grace: Duration,
}

impl PollManager {
    /// Builds the clients against the system trust store.
    pub fn new(
        targets: Vec<PollTarget>,
        adapter: Arc<dyn ExchangeAdapter>,
        interval: Duration,
        queue: TickerSender,
    ) -> Result<Self, ConfigError> {
        let tls_config = tls::client_config()?;
        Self::with_tls_config(targets, adapter, interval, queue, tls_config)
    }

    /// Builds the clients over a caller-supplied TLS configuration.
    /// Lets tests pin their own certificate authority.
    pub fn with_tls_config(
        targets: Vec<PollTarget>,
        adapter: Arc<dyn ExchangeAdapter>,
        interval: Duration,
        queue: TickerSender,
        tls_config: Arc<ClientConfig>,
    ) -> Result<Self, ConfigError> {
        let mut clients = Vec::with_capacity(targets.len());
        for target in targets {
            let client = ScheduledClient::new(
                target.symbol,
                &target.url,
                interval,
                adapter.clone(),
                tls_config.clone(),
                queue.clone(),
            )?;
            info!(
                "[manager] created client {} -> {}",
                client.symbol(),
                client.endpoint()
            );
            clients.push(client);
        }
        Ok(Self {
            clients,
            grace: STOP_GRACE,
        })
    }

    /// Spawns the reactor thread and moves every client onto it.
    pub fn start(self) -> anyhow::Result<PollManagerHandle> {
        let PollManager { clients, grace } = self;

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let stopping = Arc::new(AtomicBool::new(false));

        let reactor_flag = stopping.clone();
        let interrupt_tx = stop_tx.clone();

        let thread = std::thread::Builder::new()
            .name("poll-reactor".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!("[manager] failed to build the reactor runtime: {err}");
                        reactor_flag.store(true, Ordering::Relaxed);
                        return;
                    }
                };
                let local = LocalSet::new();

                for client in clients {
                    METRICS.clients_active.fetch_add(1, Ordering::Relaxed);
                    local.spawn_local(client.run());
                }

                local.spawn_local(report_metrics());

                {
                    let flag = reactor_flag.clone();
                    local.spawn_local(async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            info!("[manager] interrupt received, shutting down");
                            flag.store(true, Ordering::Relaxed);
                            let _ = interrupt_tx.try_send(());
                        }
                    });
                }

                local.block_on(&runtime, async move {
                    let _ = stop_rx.recv().await;
                    // grace window: in-flight cycles keep running
                    sleep(grace).await;
                });

                drop(local);
                runtime.shutdown_timeout(Duration::from_millis(250));
                reactor_flag.store(true, Ordering::Relaxed);
                info!("[manager] reactor stopped");
            })
            .context("failed to spawn the reactor thread")?;

        Ok(PollManagerHandle {
            stop_tx,
            stopping,
            thread: Some(thread),
        })
    }
}

/// Handle held by the consuming side of the program.
pub struct PollManagerHandle {
    stop_tx: mpsc::Sender<()>,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollManagerHandle {
    /// Asks the reactor to wind down. Returns immediately.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Relaxed);
        let _ = self.stop_tx.try_send(());
    }

    /// True once shutdown has been requested from anywhere,
    /// including Ctrl-C caught inside the reactor.
    pub fn stop_requested(&self) -> bool {
        self.stopping.load(Ordering::Relaxed)
    }

    /// Stops the reactor and blocks until its thread has exited.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("[manager] reactor thread panicked");
            }
        }
    }
}

impl Drop for PollManagerHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.stop();
            let _ = thread.join();
        }
    }
}

async fn report_metrics() {
    loop {
        sleep(METRICS_INTERVAL).await;
        info!(
            "[metrics] clients={} polls={} tickers={} non200={} stalls={} transport={} handshake={} hostname={} protocol={} shape={}",
            METRICS.clients_active.load(Ordering::Relaxed),
            METRICS.polls_started.load(Ordering::Relaxed),
            METRICS.tickers_produced.load(Ordering::Relaxed),
            METRICS.http_non_ok.load(Ordering::Relaxed),
            METRICS.queue_full_stalls.load(Ordering::Relaxed),
            METRICS.transport_errors.load(Ordering::Relaxed),
            METRICS.handshake_errors.load(Ordering::Relaxed),
            METRICS.hostname_rejects.load(Ordering::Relaxed),
            METRICS.protocol_errors.load(Ordering::Relaxed),
            METRICS.shape_errors.load(Ordering::Relaxed),
        );
    }
}
