//! End-to-end tests against local canned servers: plain HTTP for the
//! polling loop, tokio-rustls for the certificate paths.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
use rustls::RootCertStore;
use rustls::pki_types::PrivateKeyDer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;

use ticker_rest_multi_poller::{
    config::PollTarget,
    exchanges::get_adapter,
    metrics::METRICS,
    poller::{PollManager, ScheduledClient},
    queue::{self, TickerReceiver, TickerSender},
    schema::Ticker,
    tls,
};

const BINANCE_BODY: &str = r#"{"symbol":"ETHBTC","highPrice":"0.05","lowPrice":"0.04","lastPrice":"0.045","volume":"100.0","closeTime":1}"#;

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Answers every connection with the same canned response and counts
/// accepted connections.
async fn spawn_canned_server(response: String) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let response = response.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (addr, hits)
}

struct TestAuthority {
    cert: rcgen::Certificate,
    key: KeyPair,
}

fn authority() -> TestAuthority {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let cert = params.self_signed(&key).unwrap();
    TestAuthority { cert, key }
}

fn issue(authority: &TestAuthority, sans: &[&str]) -> (rcgen::Certificate, KeyPair) {
    let key = KeyPair::generate().unwrap();
    let names: Vec<String> = sans.iter().map(ToString::to_string).collect();
    let params = CertificateParams::new(names).unwrap();
    let cert = params.signed_by(&key, &authority.cert, &authority.key).unwrap();
    (cert, key)
}

fn trust(authority: &TestAuthority) -> Arc<rustls::ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.add(authority.cert.der().clone()).unwrap();
    tls::client_config_with_roots(Arc::new(roots)).unwrap()
}

/// TLS configuration for clients that only ever talk plain HTTP in a
/// test; the constructor requires one regardless.
fn unused_tls_config() -> Arc<rustls::ClientConfig> {
    trust(&authority())
}

fn tls_server_config(cert: &rcgen::Certificate, key: &KeyPair) -> Arc<rustls::ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(
            vec![cert.der().clone()],
            PrivateKeyDer::Pkcs8(key.serialize_der().into()),
        )
        .unwrap();
    Arc::new(config)
}

/// TLS server around a canned response. Returns the address, a TCP
/// accept counter, and a counter of requests that actually made it
/// through the handshake.
async fn spawn_tls_server(
    server_config: Arc<rustls::ServerConfig>,
    response: String,
) -> (SocketAddr, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));
    let acceptor = tokio_rustls::TlsAcceptor::from(server_config);

    let accept_counter = accepts.clone();
    let served_counter = served.clone();
    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                break;
            };
            accept_counter.fetch_add(1, Ordering::SeqCst);
            let acceptor = acceptor.clone();
            let response = response.clone();
            let served = served_counter.clone();
            tokio::spawn(async move {
                // a client that rejects the certificate aborts here
                let Ok(mut stream) = acceptor.accept(tcp).await else {
                    return;
                };
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request).await;
                served.fetch_add(1, Ordering::SeqCst);
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    (addr, accepts, served)
}

fn binance_client(addr: SocketAddr, interval_ms: u64, queue: TickerSender) -> ScheduledClient {
    ScheduledClient::new(
        "ETHBTC",
        &format!("http://{addr}/api/v1/ticker/24hr?symbol=ETHBTC"),
        Duration::from_millis(interval_ms),
        get_adapter("binance").unwrap(),
        unused_tls_config(),
        queue,
    )
    .unwrap()
}

async fn wait_for_ticker(queue: &mut TickerReceiver) -> Ticker {
    loop {
        if let Some(ticker) = queue.try_pop() {
            return ticker;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn ok_response_produces_a_canonical_ticker() {
    let (addr, _hits) = spawn_canned_server(http_response("200 OK", BINANCE_BODY)).await;
    let (tx, mut rx) = queue::bounded(16);
    tokio::spawn(binance_client(addr, 200, tx).run());

    let ticker = timeout(Duration::from_secs(2), wait_for_ticker(&mut rx))
        .await
        .expect("first poll should deliver a record");
    assert_eq!(ticker.symbol, "ETHBTC");
    assert_eq!(ticker.high, 0.05);
    assert_eq!(ticker.low, 0.04);
    assert_eq!(ticker.close, 0.045);
    assert_eq!(ticker.volume, 100.0);
}

#[tokio::test]
async fn service_unavailable_produces_nothing_and_polling_continues() {
    let response = http_response("503 Service Unavailable", r#"{"code":-1,"msg":"down"}"#);
    let (addr, hits) = spawn_canned_server(response).await;
    let (tx, mut rx) = queue::bounded(16);
    tokio::spawn(binance_client(addr, 100, tx).run());

    tokio::time::sleep(Duration::from_millis(450)).await;

    assert!(rx.try_pop().is_none(), "a 503 must not produce a record");
    let polls = hits.load(Ordering::SeqCst);
    assert!(polls >= 2, "expected repeated polling, saw {polls} requests");
}

#[tokio::test]
async fn malformed_payload_does_not_stop_the_schedule() {
    let (addr, hits) = spawn_canned_server(http_response("200 OK", "server said what")).await;
    let (tx, mut rx) = queue::bounded(16);
    tokio::spawn(binance_client(addr, 100, tx).run());

    tokio::time::sleep(Duration::from_millis(450)).await;

    assert!(rx.try_pop().is_none());
    assert!(hits.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn each_poll_waits_a_full_interval_after_the_previous_cycle() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stamps: Arc<Mutex<Vec<Instant>>> = Arc::default();
    {
        let stamps = stamps.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                stamps.lock().unwrap().push(Instant::now());
                tokio::spawn(async move {
                    let mut request = [0u8; 1024];
                    let _ = socket.read(&mut request).await;
                    let _ = socket
                        .write_all(http_response("200 OK", BINANCE_BODY).as_bytes())
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });
    }

    let (tx, _rx) = queue::bounded(64);
    tokio::spawn(binance_client(addr, 200, tx).run());
    tokio::time::sleep(Duration::from_millis(700)).await;

    let stamps = stamps.lock().unwrap();
    assert!(stamps.len() >= 2, "expected at least two polls, saw {}", stamps.len());
    for pair in stamps.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap >= Duration::from_millis(150),
            "consecutive polls only {gap:?} apart"
        );
    }
}

#[tokio::test]
async fn full_queue_stalls_the_producer_without_losing_records() {
    let (addr, _hits) = spawn_canned_server(http_response("200 OK", BINANCE_BODY)).await;
    let (tx, mut rx) = queue::bounded(1);
    tokio::spawn(binance_client(addr, 25, tx).run());

    // give the producer time to run into the full queue
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut seen = 0;
    let deadline = Instant::now() + Duration::from_secs(2);
    while seen < 3 && Instant::now() < deadline {
        match rx.try_pop() {
            Some(ticker) => {
                assert_eq!(ticker.symbol, "ETHBTC");
                seen += 1;
            }
            None => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    assert_eq!(seen, 3, "producer should resume once the consumer drains");
    assert!(METRICS.queue_full_stalls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn kucoin_documents_parse_over_eof_delimited_bodies() {
    let body = r#"{"success":true,"data":{"symbol":"ETH-BTC","lastDealPrice":0.045,"high":0.05,"low":0.04,"vol":100.0,"datetime":1509948000000}}"#;
    // no Content-Length; the closed connection delimits the body
    let response =
        format!("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}");
    let (addr, _hits) = spawn_canned_server(response).await;

    let (tx, mut rx) = queue::bounded(16);
    let client = ScheduledClient::new(
        "ETH-BTC",
        &format!("http://{addr}/v1/open/tick?symbol=ETH-BTC"),
        Duration::from_millis(200),
        get_adapter("kucoin").unwrap(),
        unused_tls_config(),
        tx,
    )
    .unwrap();
    tokio::spawn(client.run());

    let ticker = timeout(Duration::from_secs(2), wait_for_ticker(&mut rx))
        .await
        .expect("kucoin document should convert");
    assert_eq!(ticker.symbol, "ETH-BTC");
    assert_eq!(ticker.close, 0.045);
    assert_eq!(ticker.volume, 100.0);
}

#[tokio::test]
async fn https_end_to_end_with_a_matching_certificate() {
    let authority = authority();
    let (leaf, leaf_key) = issue(&authority, &["localhost"]);
    let (addr, _accepts, served) =
        spawn_tls_server(tls_server_config(&leaf, &leaf_key), http_response("200 OK", BINANCE_BODY))
            .await;

    let (tx, mut rx) = queue::bounded(16);
    let client = ScheduledClient::new(
        "ETHBTC",
        &format!("https://localhost:{}/api/v1/ticker/24hr?symbol=ETHBTC", addr.port()),
        Duration::from_millis(200),
        get_adapter("binance").unwrap(),
        trust(&authority),
        tx,
    )
    .unwrap();
    tokio::spawn(client.run());

    let ticker = timeout(Duration::from_secs(3), wait_for_ticker(&mut rx))
        .await
        .expect("handshake and fetch should succeed");
    assert_eq!(ticker.symbol, "ETHBTC");
    assert!(served.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn certificate_for_another_host_blocks_the_request_but_not_the_schedule() {
    let authority = authority();
    let (leaf, leaf_key) = issue(&authority, &["other.example.org"]);
    let (addr, accepts, served) =
        spawn_tls_server(tls_server_config(&leaf, &leaf_key), http_response("200 OK", BINANCE_BODY))
            .await;

    let (tx, mut rx) = queue::bounded(16);
    let client = ScheduledClient::new(
        "ETHBTC",
        &format!("https://localhost:{}/api/v1/ticker/24hr?symbol=ETHBTC", addr.port()),
        Duration::from_millis(150),
        get_adapter("binance").unwrap(),
        trust(&authority),
        tx,
    )
    .unwrap();
    tokio::spawn(client.run());

    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(rx.try_pop().is_none(), "no record may cross a failed identity check");
    assert_eq!(
        served.load(Ordering::SeqCst),
        0,
        "no application data may cross a failed identity check"
    );
    assert!(
        accepts.load(Ordering::SeqCst) >= 2,
        "the schedule must survive certificate rejections"
    );
}

#[test]
fn manager_runs_clients_and_stops_on_request() {
    let harness = tokio::runtime::Runtime::new().unwrap();
    let (addr, _hits) =
        harness.block_on(spawn_canned_server(http_response("200 OK", BINANCE_BODY)));

    let (tx, mut rx) = queue::bounded(16);
    let targets = vec![PollTarget {
        symbol: "ETHBTC".into(),
        url: format!("http://{addr}/api/v1/ticker/24hr?symbol=ETHBTC"),
    }];
    let manager = PollManager::with_tls_config(
        targets,
        get_adapter("binance").unwrap(),
        Duration::from_millis(100),
        tx,
        unused_tls_config(),
    )
    .unwrap();
    let handle = manager.start().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut first = None;
    while first.is_none() && Instant::now() < deadline {
        first = rx.try_pop();
        std::thread::sleep(Duration::from_millis(10));
    }
    let first = first.expect("manager should deliver records");
    assert_eq!(first.symbol, "ETHBTC");
    assert!(!handle.stop_requested());

    handle.stop();
    assert!(handle.stop_requested());

    let stop_started = Instant::now();
    handle.join();
    assert!(
        stop_started.elapsed() < Duration::from_secs(5),
        "join should return promptly after the grace window"
    );

    // whatever the grace window still produced must remain poppable
    while rx.try_pop().is_some() {}
}
