//! TLS setup for the transport.

use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

/// Native roots are read from the OS store once per process.
static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS
        .get_or_init(|| {
            let result = rustls_native_certs::load_native_certs();
            for err in &result.errors {
                tracing::warn!(error = %err, "error loading native root certificate");
            }
            tracing::debug!(count = result.certs.len(), "loaded native root certificates");
            result.certs
        })
        .as_slice()
}

/// Crypto provider: the process default if one is installed, else aws-lc-rs.
///
/// Never installs a global default.
pub fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build a rustls `ClientConfig` trusting the OS root store.
///
/// # Errors
///
/// Fails when the OS store is empty or none of its certificates parse, so
/// misconfiguration shows up at client construction instead of at the first
/// handshake.
pub fn native_roots_client_config() -> Result<rustls::ClientConfig, String> {
    let certs = native_root_certs();
    if certs.is_empty() {
        return Err("no native root CA certificates found in OS certificate store".to_owned());
    }

    let mut root_store = rustls::RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(format!(
            "no valid native root CA certificates parsed ({} found)",
            certs.len()
        ));
    }

    rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| format!("failed to set TLS protocol versions: {e}"))
        .map(|b| b.with_root_certificates(root_store).with_no_client_auth())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn native_roots_are_cached() {
        let first = native_root_certs();
        let second = native_root_certs();
        assert!(std::ptr::eq(first, second), "should return the cached slice");
    }

    #[test]
    fn native_roots_client_config_does_not_panic() {
        // Minimal containers may have no OS certificates; both outcomes are valid.
        if let Err(e) = native_roots_client_config() {
            tracing::debug!(error = %e, "native roots unavailable");
        }
    }
}
