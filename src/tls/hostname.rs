use std::fmt;

use x509_parser::prelude::*;

/// Classified outcome of matching a hostname against the names in a
/// certificate.
///
/// Only `MatchFound` lets a handshake proceed. The other outcomes are
/// kept distinct because they mean different things operationally:
/// a `MatchNotFound` against a valid chain usually points at a DNS
/// record or load balancer handing out the wrong certificate, while
/// `MalformedCertificate` points at a hostile or broken peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameValidation {
    /// One of the certificate's names covers the hostname
    MatchFound,
    /// Names were present and readable, none covered the hostname
    MatchNotFound,
    /// The certificate carries no Subject Alternative Name extension
    NoSANPresent,
    /// Unparsable DER, or a name with an embedded NUL byte
    MalformedCertificate,
    /// Nothing to compare: empty hostname, or no usable subject name
    Error,
}

impl HostnameValidation {
    pub fn as_str(self) -> &'static str {
        match self {
            HostnameValidation::MatchFound => "MatchFound",
            HostnameValidation::MatchNotFound => "MatchNotFound",
            HostnameValidation::NoSANPresent => "NoSANPresent",
            HostnameValidation::MalformedCertificate => "MalformedCertificate",
            HostnameValidation::Error => "Error",
        }
    }
}

impl fmt::Display for HostnameValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matches `hostname` against the DNS names of a DER-encoded
/// certificate.
///
/// Order of inspection:
/// 1. Subject Alternative Name entries of DNS type. If the extension
///    exists, its verdict is final even when no entry matches.
/// 2. The subject Common Name, only when the certificate has no SAN
///    extension at all.
///
/// A name containing an embedded NUL byte classifies the whole
/// certificate as malformed; truncation tricks against C peers live
/// exactly there.
pub fn validate_hostname(hostname: &str, cert_der: &[u8]) -> HostnameValidation {
    if hostname.is_empty() {
        return HostnameValidation::Error;
    }
    let Ok((_, cert)) = X509Certificate::from_der(cert_der) else {
        return HostnameValidation::MalformedCertificate;
    };
    match match_subject_alternative_names(hostname, &cert) {
        HostnameValidation::NoSANPresent => match_common_name(hostname, &cert),
        outcome => outcome,
    }
}

/// Human-readable subject line for log output.
pub(crate) fn describe_subject(cert_der: &[u8]) -> String {
    match X509Certificate::from_der(cert_der) {
        Ok((_, cert)) => cert.subject().to_string(),
        Err(_) => "<unparseable certificate>".to_string(),
    }
}

fn match_subject_alternative_names(
    hostname: &str,
    cert: &X509Certificate<'_>,
) -> HostnameValidation {
    let san = match cert.subject_alternative_name() {
        Ok(Some(extension)) => extension.value,
        Ok(None) => return HostnameValidation::NoSANPresent,
        Err(_) => return HostnameValidation::MalformedCertificate,
    };
    for name in &san.general_names {
        if let GeneralName::DNSName(pattern) = name {
            if pattern.contains('\0') {
                return HostnameValidation::MalformedCertificate;
            }
            if dns_pattern_matches(pattern, hostname) {
                return HostnameValidation::MatchFound;
            }
        }
    }
    HostnameValidation::MatchNotFound
}

fn match_common_name(hostname: &str, cert: &X509Certificate<'_>) -> HostnameValidation {
    let Some(attribute) = cert.subject().iter_common_name().next() else {
        return HostnameValidation::Error;
    };
    let Ok(common_name) = attribute.as_str() else {
        return HostnameValidation::MalformedCertificate;
    };
    if common_name.contains('\0') {
        return HostnameValidation::MalformedCertificate;
    }
    if dns_pattern_matches(common_name, hostname) {
        HostnameValidation::MatchFound
    } else {
        HostnameValidation::MatchNotFound
    }
}

/// Wildcard rule: a leading "*." stands for exactly one label.
/// "*.exchange.com" covers "api.exchange.com" but neither
/// "exchange.com" nor "a.b.exchange.com". A '*' anywhere else never
/// matches. Comparison is ASCII case-insensitive.
fn dns_pattern_matches(pattern: &str, hostname: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        let Some((first_label, rest)) = hostname.split_once('.') else {
            return false;
        };
        !first_label.is_empty() && !suffix.is_empty() && rest.eq_ignore_ascii_case(suffix)
    } else if pattern.contains('*') {
        false
    } else {
        pattern.eq_ignore_ascii_case(hostname)
    }
}
