use thiserror::Error;

/// Fatal startup problems.
///
/// Anything in here means the process cannot meaningfully run:
/// unreadable config, malformed JSON, an empty portfolio, or a TLS
/// environment without trust roots. These are raised once during
/// startup and abort the program; nothing retries them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file '{path}' is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("portfolio is empty, add at least one coin before starting")]
    EmptyPortfolio,

    #[error("poll_interval_secs must be at least 1")]
    ZeroPollInterval,

    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("exchange '{0}' is not supported")]
    UnknownExchange(String),

    #[error("invalid endpoint URL '{url}': {reason}")]
    Endpoint { url: String, reason: String },

    #[error("no usable TLS trust roots found on this system")]
    NoTrustRoots,

    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Payload-shape problems reported by exchange adapters.
///
/// Every variant names the exchange and the offending field so a log
/// line is enough to tell which venue changed its response format.
/// These are per-cycle failures: the record is dropped and the next
/// poll proceeds normally.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShapeError {
    #[error("response body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("{exchange}: required field '{field}' is missing")]
    MissingField {
        exchange: &'static str,
        field: &'static str,
    },

    #[error("{exchange}: field '{field}' is not a {expected}")]
    WrongType {
        exchange: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("{exchange}: field '{field}' does not hold a number: '{value}'")]
    BadNumber {
        exchange: &'static str,
        field: &'static str,
        value: String,
    },
}

/// Everything that can end a single poll cycle early.
///
/// IMPORTANT:
/// - A non-200 HTTP status is NOT in this enum. The exchange answered;
///   the cycle simply produces no record and reschedules normally.
/// - A full ticker queue is NOT in this enum either. The producer
///   stalls until space frees up; saturation is counted in metrics,
///   not raised.
///
/// `HostnameMismatch` is kept separate from `Handshake` on purpose:
/// a certificate that fails the identity check is a different
/// operational signal than a venue with a broken TLS stack, and the
/// two are counted separately.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    #[error("server certificate rejected for this hostname: {0}")]
    HostnameMismatch(String),

    #[error("malformed HTTP response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("ticker queue is closed, consumer is gone")]
    QueueClosed,
}
