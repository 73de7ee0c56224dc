use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::{debug, error, info, warn};
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio::time::{Duration, sleep};
use tokio_rustls::TlsConnector;

use crate::{
    error::{ConfigError, PollError, ShapeError},
    exchanges::adapter::ExchangeAdapter,
    http,
    metrics::METRICS,
    poller::endpoint::Endpoint,
    queue::TickerSender,
    tls::verifier::is_name_error,
};

/// One scheduled polling client: a single ticker endpoint, polled on
/// a fixed interval, forever.
///
/// Each cycle this client:
/// - Opens one fresh connection (TCP, plus TLS when the endpoint is
///   https)
/// - Sends exactly one GET; there is never more than one request in
///   flight per endpoint
/// - Converts a 200 response through the exchange adapter
/// - Hands the record to the bounded queue
///
/// DESIGN:
/// - A failed cycle never changes the schedule. Transport errors,
///   rejected certificates, non-200 answers and malformed payloads
///   all end the cycle early, get counted, and the next poll starts
///   one interval later.
/// - The client owns its connector and queue handle outright and is
///   moved into its task; nothing here is shared mutable state.
/// - Hostname resolution happens off the reactor thread inside the
///   connector; a slow DNS answer delays only this client's cycle,
///   not the other clients' schedules.
///
/// This client does NOT:
/// - Retry within a cycle or back off
/// - Follow redirects (a 3xx is just a non-200 status)
/// - Reuse connections across cycles
pub struct ScheduledClient {
    symbol: String,
    endpoint: Endpoint,
    interval: Duration,
    adapter: Arc<dyn ExchangeAdapter>,
    tls: TlsConnector,
    queue: TickerSender,
}

/// How a completed cycle ended. Failures travel as `PollError`.
enum CycleOutcome {
    Delivered,
    SkippedStatus(u16),
}

impl ScheduledClient {
    pub fn new(
        symbol: impl Into<String>,
        url: &str,
        interval: Duration,
        adapter: Arc<dyn ExchangeAdapter>,
        tls_config: Arc<ClientConfig>,
        queue: TickerSender,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            symbol: symbol.into(),
            endpoint: Endpoint::parse(url)?,
            interval,
            adapter,
            tls: TlsConnector::from(tls_config),
            queue,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Poll loop. The first cycle starts immediately; every later one
    /// starts one interval after the previous cycle finished.
    pub async fn run(self) {
        info!(
            "[{}] polling {} every {:?}",
            self.symbol, self.endpoint, self.interval
        );
        loop {
            METRICS.polls_started.fetch_add(1, Ordering::Relaxed);
            match self.execute_cycle().await {
                Ok(CycleOutcome::Delivered) => {
                    METRICS.tickers_produced.fetch_add(1, Ordering::Relaxed);
                    debug!("[{}] delivered one record", self.symbol);
                }
                Ok(CycleOutcome::SkippedStatus(status)) => {
                    METRICS.http_non_ok.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "[{}] endpoint answered {status}, nothing to record this cycle",
                        self.symbol
                    );
                }
                Err(PollError::QueueClosed) => {
                    info!("[{}] consumer is gone, stopping this client", self.symbol);
                    return;
                }
                Err(err) => self.note_failure(&err),
            }
            sleep(self.interval).await;
        }
    }

    async fn execute_cycle(&self) -> Result<CycleOutcome, PollError> {
        let raw = self.fetch_raw().await?;
        let response = http::parse_response(&raw)?;
        if response.status != 200 {
            return Ok(CycleOutcome::SkippedStatus(response.status));
        }

        let document: serde_json::Value = serde_json::from_slice(&response.body)
            .map_err(|err| ShapeError::InvalidJson(err.to_string()))?;
        let ticker = self.adapter.parse_ticker(&document)?;

        self.queue.push(ticker).await?;
        Ok(CycleOutcome::Delivered)
    }

    async fn fetch_raw(&self) -> Result<Vec<u8>, PollError> {
        let request = http::build_request(&self.endpoint.host, &self.endpoint.request_target());
        let tcp = TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port)).await?;

        if self.endpoint.is_tls() {
            let server_name = ServerName::try_from(self.endpoint.host.clone()).map_err(|err| {
                PollError::Handshake(format!(
                    "invalid server name '{}': {err}",
                    self.endpoint.host
                ))
            })?;
            let stream = self
                .tls
                .connect(server_name, tcp)
                .await
                .map_err(classify_handshake_error)?;
            Ok(http::exchange(stream, request.as_bytes()).await?)
        } else {
            Ok(http::exchange(tcp, request.as_bytes()).await?)
        }
    }

    fn note_failure(&self, err: &PollError) {
        match err {
            PollError::Transport(_) => {
                METRICS.transport_errors.fetch_add(1, Ordering::Relaxed);
                error!("[{}] {err}", self.symbol);
            }
            PollError::Handshake(_) => {
                METRICS.handshake_errors.fetch_add(1, Ordering::Relaxed);
                error!("[{}] {err}", self.symbol);
            }
            PollError::HostnameMismatch(_) => {
                // the verifier already logged the classification and
                // certificate subject
                METRICS.hostname_rejects.fetch_add(1, Ordering::Relaxed);
                warn!("[{}] {err}", self.symbol);
            }
            PollError::Protocol(_) => {
                METRICS.protocol_errors.fetch_add(1, Ordering::Relaxed);
                error!("[{}] {err}", self.symbol);
            }
            PollError::Shape(_) => {
                METRICS.shape_errors.fetch_add(1, Ordering::Relaxed);
                warn!("[{}] {err}", self.symbol);
            }
            // handled in run(), never reaches here
            PollError::QueueClosed => {}
        }
    }
}

/// tokio-rustls surfaces handshake failures as `io::Error` with the
/// rustls error tucked inside. Pull it out to tell an identity
/// rejection apart from every other handshake problem.
fn classify_handshake_error(err: std::io::Error) -> PollError {
    if let Some(tls_error) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        if let rustls::Error::InvalidCertificate(cert_error) = tls_error {
            if is_name_error(cert_error) {
                return PollError::HostnameMismatch(tls_error.to_string());
            }
        }
        return PollError::Handshake(tls_error.to_string());
    }
    PollError::Handshake(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::io;

    use rustls::CertificateError;

    use super::*;

    #[test]
    fn name_rejections_map_to_hostname_mismatch() {
        let inner = rustls::Error::InvalidCertificate(CertificateError::NotValidForName);
        let err = io::Error::new(io::ErrorKind::InvalidData, inner);
        assert!(matches!(
            classify_handshake_error(err),
            PollError::HostnameMismatch(_)
        ));
    }

    #[test]
    fn chain_failures_stay_handshake_errors() {
        let inner = rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer);
        let err = io::Error::new(io::ErrorKind::InvalidData, inner);
        assert!(matches!(
            classify_handshake_error(err),
            PollError::Handshake(_)
        ));
    }

    #[test]
    fn plain_io_failures_stay_handshake_errors() {
        let err = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(
            classify_handshake_error(err),
            PollError::Handshake(_)
        ));
    }
}
