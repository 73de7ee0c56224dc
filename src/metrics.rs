use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Global runtime metrics for the poller.
///
/// Purpose:
/// - Track active clients
/// - Track poll cycles and produced records
/// - Track failure classes (transport, handshake, hostname, shape)
/// - Track queue back-pressure
///
/// Design:
/// - Lock-free (Atomics)
/// - Cheap to update
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    // High-level
    pub clients_active: AtomicUsize,

    // Throughput
    pub polls_started: AtomicUsize,
    pub tickers_produced: AtomicUsize,

    // Per-cycle outcomes that are not failures
    pub http_non_ok: AtomicUsize,
    pub queue_full_stalls: AtomicUsize,

    // Failures
    pub transport_errors: AtomicUsize,
    pub handshake_errors: AtomicUsize,
    pub hostname_rejects: AtomicUsize,
    pub protocol_errors: AtomicUsize,
    pub shape_errors: AtomicUsize,
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
