//! TLS setup for the polling clients.
//!
//! Two pieces live here:
//! - [`hostname`]: the classified hostname-vs-certificate check
//! - [`verifier`]: the rustls verifier that wires that check into
//!   every handshake, on top of webpki chain validation
//!
//! The functions below assemble the one `ClientConfig` all clients
//! share. Roots come from the system store; a host with no usable
//! roots cannot validate anything and fails startup.

pub mod hostname;
pub mod verifier;

use std::sync::Arc;

use log::{debug, warn};
use rustls::{ClientConfig, RootCertStore};

pub use hostname::{HostnameValidation, validate_hostname};
pub use verifier::HostCheckingVerifier;

use crate::error::ConfigError;

/// Builds the client TLS configuration from the system trust store.
pub fn client_config() -> Result<Arc<ClientConfig>, ConfigError> {
    let roots = system_roots()?;
    client_config_with_roots(Arc::new(roots))
}

/// Builds the client TLS configuration over a caller-supplied root
/// store. Lets tests pin their own authority.
pub fn client_config_with_roots(roots: Arc<RootCertStore>) -> Result<Arc<ClientConfig>, ConfigError> {
    let verifier = Arc::new(HostCheckingVerifier::new(roots)?);
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|err| ConfigError::Tls(err.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

fn system_roots() -> Result<RootCertStore, ConfigError> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        warn!("[tls] skipping an unreadable system certificate: {err}");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    if ignored > 0 {
        warn!("[tls] ignored {ignored} unparsable system root certificates");
    }
    if added == 0 {
        return Err(ConfigError::NoTrustRoots);
    }
    debug!("[tls] loaded {added} system trust roots");
    Ok(roots)
}
