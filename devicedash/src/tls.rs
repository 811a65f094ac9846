//! Trust a custom CA bundle (PEM) for both the HTTP and WebSocket clients.

use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};

use crate::error::ApiError;

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ApiError> {
    let file = File::open(path)
        .map_err(|e| ApiError::Transport(format!("open CA {}: {e}", path.display())))?;
    let mut rd = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut rd)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Transport(format!("parse CA {}: {e}", path.display())))?;
    if certs.is_empty() {
        return Err(ApiError::Transport(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Root certificates for reqwest.
pub fn reqwest_roots(path: &Path) -> Result<Vec<reqwest::Certificate>, ApiError> {
    load_certs(path)?
        .iter()
        .map(|c| reqwest::Certificate::from_der(c.as_ref()).map_err(ApiError::from))
        .collect()
}

/// rustls client config for tokio-tungstenite.
pub fn rustls_config(path: &Path) -> Result<Arc<ClientConfig>, ApiError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots
            .add(cert)
            .map_err(|e| ApiError::Transport(format!("add CA: {e}")))?;
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let cfg = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ApiError::Transport(format!("tls config: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bundle_is_a_transport_error() {
        let err = rustls_config(Path::new("/nonexistent/ca.pem")).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn bundle_without_certs_is_rejected() {
        let td = tempfile::tempdir().unwrap();
        let p = td.path().join("empty.pem");
        std::fs::write(&p, "not a pem file\n").unwrap();
        let err = reqwest_roots(&p).unwrap_err();
        assert!(err.to_string().contains("no certificates"), "{err}");
    }
}
