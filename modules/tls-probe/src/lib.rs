//! Negotiated TLS protocol version for a domain's :443 endpoint.

use anyhow::Result;
use rustls::{ClientConfig, ProtocolVersion};
use std::fmt;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Outcome of a successful handshake. Versions with known protocol-level
/// weaknesses (SSLv2/SSLv3/TLS1.0/TLS1.1) are flagged distinctly from
/// modern ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPosture {
    pub version: String,
    pub vulnerable: bool,
}

impl fmt::Display for TlsPosture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vulnerable {
            write!(f, "{} (vulnerable)", self.version)
        } else {
            write!(f, "{} (ok)", self.version)
        }
    }
}

/// Classify a negotiated protocol version.
pub fn classify(version: ProtocolVersion) -> TlsPosture {
    let (name, vulnerable) = match version {
        ProtocolVersion::SSLv2 => ("SSLv2", true),
        ProtocolVersion::SSLv3 => ("SSLv3", true),
        ProtocolVersion::TLSv1_0 => ("TLSv1.0", true),
        ProtocolVersion::TLSv1_1 => ("TLSv1.1", true),
        ProtocolVersion::TLSv1_2 => ("TLSv1.2", false),
        ProtocolVersion::TLSv1_3 => ("TLSv1.3", false),
        other => return TlsPosture { version: format!("{:?}", other), vulnerable: false },
    };
    TlsPosture { version: name.to_string(), vulnerable }
}

/// Handshake with `host:443` and read the negotiated version.
/// Any connection or handshake failure is no data, not an error.
pub async fn probe(host: &str, deadline: Duration) -> Option<TlsPosture> {
    match handshake_version(host, deadline).await {
        Ok(Some(version)) => Some(classify(version)),
        Ok(None) => None,
        Err(e) => {
            debug!(host, error = %e, "tls probe got no handshake");
            None
        }
    }
}

async fn handshake_version(host: &str, deadline: Duration) -> Result<Option<ProtocolVersion>> {
    // Ensure a crypto provider is installed (ring)
    let _ = rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider());
    let addr = resolve_first(host, 443)?;
    let stream = timeout(deadline, TcpStream::connect(addr)).await??;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = match host.parse::<std::net::IpAddr>() {
        Ok(ip) => rustls::pki_types::ServerName::IpAddress(ip.into()),
        Err(_) => rustls::pki_types::ServerName::try_from(host.to_owned())
            .map_err(|_| anyhow::anyhow!("invalid server name"))?,
    };
    let tls = timeout(deadline, connector.connect(server_name, stream)).await??;
    Ok(tls.get_ref().1.protocol_version())
}

fn resolve_first(host: &str, port: u16) -> Result<std::net::SocketAddr> {
    let mut it = (host, port).to_socket_addrs()?;
    it.next().ok_or_else(|| anyhow::anyhow!("failed to resolve: {}", host))
}
