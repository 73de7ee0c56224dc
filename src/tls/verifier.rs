use std::sync::Arc;

use log::{debug, warn};
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme};

use crate::error::ConfigError;
use crate::tls::hostname::{self, HostnameValidation};

/// Certificate verifier that keeps webpki's chain validation and puts
/// this crate's classified hostname check in charge of identity.
///
/// IMPORTANT:
/// - Chain trust and identity are separate questions. A certificate
///   can chain to a trusted root and still belong to a different
///   server; only the name check ties it to the endpoint we dialed.
/// - The inner verifier's own name verdict is not final here. When
///   the chain is trusted and only the name was refused, the
///   classified check decides instead: it falls back to the subject
///   Common Name for certificates without a SAN, and its wildcard
///   rule is one label, nothing else.
/// - Every rejection logs the classification and the certificate
///   subject, so a flipped DNS record serving someone else's valid
///   certificate reads differently in the logs than a broken chain.
#[derive(Debug)]
pub struct HostCheckingVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl HostCheckingVerifier {
    pub fn new(roots: Arc<RootCertStore>) -> Result<Self, ConfigError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let inner = WebPkiServerVerifier::builder_with_provider(roots, provider)
            .build()
            .map_err(|err| ConfigError::Tls(err.to_string()))?;
        Ok(Self { inner })
    }

    fn enforce_hostname(
        &self,
        server_name: &ServerName<'_>,
        end_entity: &CertificateDer<'_>,
    ) -> Result<(), TlsError> {
        let host = server_name_text(server_name);
        let outcome = hostname::validate_hostname(&host, end_entity.as_ref());
        if outcome == HostnameValidation::MatchFound {
            debug!("[tls] '{host}' presented a certificate valid for that name");
            Ok(())
        } else {
            warn!(
                "[tls] rejecting '{host}': hostname check classified the certificate as {outcome}, subject: {}",
                hostname::describe_subject(end_entity.as_ref())
            );
            Err(TlsError::InvalidCertificate(CertificateError::NotValidForName))
        }
    }
}

impl ServerCertVerifier for HostCheckingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(verified) => self.enforce_hostname(server_name, end_entity).map(|_| verified),
            // webpki checks the chain before the name, so a name-only
            // refusal means the chain itself is trusted
            Err(TlsError::InvalidCertificate(err)) if is_name_error(&err) => self
                .enforce_hostname(server_name, end_entity)
                .map(|_| ServerCertVerified::assertion()),
            Err(err) => Err(err),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// True for the rustls error variants that mean "chain fine, name
/// wrong". Used on the client side to map handshake failures onto
/// the hostname-mismatch class.
pub(crate) fn is_name_error(err: &CertificateError) -> bool {
    matches!(
        err,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}

fn server_name_text(name: &ServerName<'_>) -> String {
    match name {
        ServerName::DnsName(dns) => dns.as_ref().to_string(),
        ServerName::IpAddress(ip) => std::net::IpAddr::from(*ip).to_string(),
        other => format!("{other:?}"),
    }
}
