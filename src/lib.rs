// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// Each module represents a well-defined responsibility:
//
// - config:    Configuration loaded from JSON, with defaults
// - schema:    The canonical Ticker record
// - error:     Failure taxonomy (config / shape / poll)
// - exchanges: Exchange adapters and adapter registry
// - http:      Minimal one-shot HTTP/1.1 GET support
// - tls:       Classified hostname validation wired into rustls
// - poller:    Scheduled clients and the poll manager
// - queue:     Bounded hand-off to the consuming side
// - metrics:   Global runtime counters
//
pub mod config;
pub mod error;
pub mod exchanges;
pub mod http;
pub mod metrics;
pub mod poller;
pub mod queue;
pub mod schema;
pub mod tls;
