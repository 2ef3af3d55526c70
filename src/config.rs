use http::Version;
use std::time::Duration;

/// Which client implementation `MessageFactory::create_client` hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// HTTP/1.1 over plain tcp.
    Http1,
}

impl ClientKind {
    pub fn name(self) -> &'static str {
        match self {
            ClientKind::Http1 => "http_factory::client::Http1Client",
        }
    }
}

/// Which emitter implementation `MessageFactory::create_emitter` hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterKind {
    /// CGI response on stdout (`Status:` line, headers, body).
    Cgi,
    /// HTTP/1.1 response on stdout, for inetd style servers.
    Http1,
}

impl EmitterKind {
    pub fn name(self) -> &'static str {
        match self {
            EmitterKind::Cgi => "http_factory::emitter::CgiEmitter",
            EmitterKind::Http1 => "http_factory::emitter::Http1Emitter",
        }
    }
}

/// Bindings and defaults of a `MessageFactory`.
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    pub client: ClientKind,
    pub emitter: EmitterKind,
    /// Protocol version of every message the factory builds.
    pub version: Version,
    /// Upper bound on one client exchange, connect through reading the body.
    pub client_timeout: Option<Duration>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            client: ClientKind::Http1,
            emitter: EmitterKind::Cgi,
            version: Version::HTTP_11,
            client_timeout: Some(Duration::from_secs(60)),
        }
    }
}
