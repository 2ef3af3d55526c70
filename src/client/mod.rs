//! Simple client for HTTP/1.1
//!
//! `Client` is the seam the factory hands out. `Http1Client` is the bundled implementation: one
//! connection per request, no pooling, no TLS.

mod decode;
mod encode;
mod error;

use futures_util::future::BoxFuture;
use futures_util::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};
use http::Method;
use std::time::Duration;

use crate::timeout::timeout;
use crate::{Request, Response};
use decode::decode;
use encode::Encoder;
pub use error::ClientError;

/// Sends a request and returns the response.
pub trait Client: Send + Sync {
    fn send(&self, req: Request) -> BoxFuture<'_, Result<Response, ClientError>>;

    /// Identifier of the implementation.
    fn name(&self) -> &'static str;
}

/// A bidirectional byte stream to a remote host.
pub trait Connection: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

/// Opens connections for a client.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, uri: &'a http::Uri) -> BoxFuture<'a, std::io::Result<Box<dyn Connection>>>;
}

/// Plain tcp, resolving the host of the request uri. `https` is refused.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, uri: &'a http::Uri) -> BoxFuture<'a, std::io::Result<Box<dyn Connection>>> {
        Box::pin(async move {
            if uri.scheme_str() == Some("https") {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "https is not supported by the tcp connector",
                ));
            }
            let host = uri.host().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "uri has no host")
            })?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            let port = uri.port_u16().unwrap_or(80);

            tracing::debug!("connecting to {}:{}", host, port);
            let stream = smol::net::TcpStream::connect((host, port)).await?;
            Ok(Box::new(stream) as Box<dyn Connection>)
        })
    }
}

/// HTTP/1.1 client over a `Connector`.
pub struct Http1Client {
    connector: Box<dyn Connector>,
    timeout: Option<Duration>,
}

impl Http1Client {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_connector(TcpConnector, timeout)
    }

    pub fn with_connector<C: Connector + 'static>(connector: C, timeout: Option<Duration>) -> Self {
        Self {
            connector: Box::new(connector),
            timeout,
        }
    }

    async fn exchange(&self, req: Request) -> Result<Response, ClientError> {
        let conn = self.connector.connect(req.uri()).await.map_err(error::connect)?;
        connect(conn, req).await
    }
}

impl Client for Http1Client {
    fn send(&self, req: Request) -> BoxFuture<'_, Result<Response, ClientError>> {
        Box::pin(async move {
            match self.timeout {
                Some(dur) => timeout(dur, self.exchange(req))
                    .await
                    .map_err(|_| error::timeout())?,
                None => self.exchange(req).await,
            }
        })
    }

    fn name(&self) -> &'static str {
        crate::config::ClientKind::Http1.name()
    }
}

impl std::fmt::Debug for Http1Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http1Client")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Send one request over an already open HTTP/1.1 connection.
pub async fn connect<RW>(mut stream: RW, req: Request) -> Result<Response, ClientError>
where
    RW: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static,
{
    let head_request = req.method() == Method::HEAD;
    let mut req = Encoder::encode(req)?;

    io::copy(&mut req, &mut stream).await.map_err(error::io)?;
    stream.flush().await.map_err(error::io)?;

    let res = decode(stream, head_request).await?;

    Ok(res)
}
