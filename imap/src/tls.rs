use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;

use crate::ImapError;

pub fn create_tls_config() -> Arc<ClientConfig> {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.into(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

pub fn parse_server_name(name: &str) -> Result<ServerName<'static>, ImapError> {
    ServerName::try_from(name.to_string())
        .map_err(|e| ImapError::Connection(format!("Invalid TLS server name {:?}: {}", name, e)))
}
