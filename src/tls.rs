//! TLS configuration/plumbing (spec §4.9 "optionally TLS"; SPEC_FULL.md
//! §4.11 ambient config layer): builds a [`tokio_rustls::TlsAcceptor`] or
//! [`tokio_rustls::TlsConnector`] from PEM-encoded key/cert material. This
//! is contract-only — it wires the handshake, and leaves everything past
//! the resulting stream to [`crate::server`]/[`crate::client`].

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig as RustlsServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

#[derive(thiserror::Error, Debug)]
pub enum TlsError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no private key found in `{0}`")]
    NoPrivateKey(PathBuf),
    #[error(transparent)]
    Rustls(#[from] tokio_rustls::rustls::Error),
    #[error("a client connector requires a configured trust anchor")]
    MissingTrustAnchor,
}

/// Keystore/truststore configuration, the Rust counterpart of the original
/// system's `keystorePath`/`truststorePath` properties.
#[derive(Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub trust_anchor_path: Option<PathBuf>,
    pub require_client_cert: bool,
}

impl TlsConfig {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            trust_anchor_path: None,
            require_client_cert: false,
        }
    }

    pub fn with_trust_anchor(mut self, path: impl Into<PathBuf>) -> Self {
        self.trust_anchor_path = Some(path.into());
        self
    }

    pub fn with_require_client_cert(mut self, required: bool) -> Self {
        self.require_client_cert = required;
        self
    }

    /// Builds a server-side acceptor. `require_client_cert` without a
    /// configured trust anchor is a configuration error, not silently
    /// ignored.
    pub fn acceptor(&self) -> Result<TlsAcceptor, TlsError> {
        let certs = load_certs(&self.cert_path)?;
        let key = load_private_key(&self.key_path)?;

        let builder = RustlsServerConfig::builder();
        let config = if self.require_client_cert {
            let roots = self.load_roots()?;
            let verifier =
                tokio_rustls::rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
                    .build()
                    .map_err(|e| {
                        tokio_rustls::rustls::Error::General(format!("client verifier: {e}"))
                    })?;
            builder
                .with_client_cert_verifier(verifier)
                .with_single_cert(certs, key)?
        } else {
            builder
                .with_no_client_auth()
                .with_single_cert(certs, key)?
        };

        Ok(TlsAcceptor::from(Arc::new(config)))
    }

    /// Builds a client-side connector trusting the configured anchor.
    /// Unlike a browser, this RPC client has no ambient trust store to fall
    /// back to, so a missing anchor is an error rather than "trust
    /// everything".
    pub fn connector(&self) -> Result<TlsConnector, TlsError> {
        let roots = self.load_roots()?;
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(TlsConnector::from(Arc::new(config)))
    }

    fn load_roots(&self) -> Result<RootCertStore, TlsError> {
        let path = self
            .trust_anchor_path
            .as_ref()
            .ok_or(TlsError::MissingTrustAnchor)?;
        let mut roots = RootCertStore::empty();
        for cert in load_certs(path)? {
            roots.add(cert)?;
        }
        Ok(roots)
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = std::fs::File::open(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = std::fs::File::open(path).map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}
