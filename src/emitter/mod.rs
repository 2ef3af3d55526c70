//! Writing a finished Response to an output channel.
//!
//! `emit` takes the Response by value, so a response is written at most once.
//!
//! - `CgiEmitter` writes a CGI response (`Status:` header, headers, body), by default to stdout.
//! - `Http1Emitter` writes an HTTP/1.1 response, with `content-length` or chunked framing and a
//! `date` header, by default to stdout.

mod encode;

use futures_util::future::BoxFuture;
use futures_util::io::{AllowStdIo, AsyncWrite, AsyncWriteExt};
use futures_util::lock::Mutex;
use thiserror::Error as ThisError;

use crate::config::EmitterKind;
use crate::Response;
use encode::{Encoder, HeadStyle};

/// Writes a Response to an output channel.
pub trait Emitter: Send + Sync {
    fn emit(&self, resp: Response) -> BoxFuture<'_, Result<(), EmitError>>;

    /// Identifier of the implementation.
    fn name(&self) -> &'static str;
}

#[derive(ThisError, Debug)]
pub enum EmitError {
    #[error("Error sending response: {0}")]
    ResponseSend(std::io::Error),
    #[error("Error preparing response body: {0}")]
    BodyConversion(std::io::Error),
}

/// Process stdout as an async writer.
pub type Stdout = AllowStdIo<std::io::Stdout>;

/// Emits CGI responses.
pub struct CgiEmitter<W = Stdout> {
    writer: Mutex<W>,
}

/// Emits HTTP/1.1 responses.
pub struct Http1Emitter<W = Stdout> {
    writer: Mutex<W>,
}

impl CgiEmitter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(AllowStdIo::new(std::io::stdout()))
    }
}

impl Http1Emitter<Stdout> {
    pub fn stdout() -> Self {
        Self::new(AllowStdIo::new(std::io::stdout()))
    }
}

impl<W> CgiEmitter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> Http1Emitter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> Emitter for CgiEmitter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    fn emit(&self, resp: Response) -> BoxFuture<'_, Result<(), EmitError>> {
        Box::pin(send(&self.writer, resp, HeadStyle::Cgi))
    }

    fn name(&self) -> &'static str {
        EmitterKind::Cgi.name()
    }
}

impl<W> Emitter for Http1Emitter<W>
where
    W: AsyncWrite + Send + Unpin,
{
    fn emit(&self, resp: Response) -> BoxFuture<'_, Result<(), EmitError>> {
        Box::pin(send(&self.writer, resp, HeadStyle::Http1))
    }

    fn name(&self) -> &'static str {
        EmitterKind::Http1.name()
    }
}

async fn send<W>(writer: &Mutex<W>, resp: Response, style: HeadStyle) -> Result<(), EmitError>
where
    W: AsyncWrite + Send + Unpin,
{
    let status = resp.status();
    let mut encoder = Encoder::encode(resp, style).map_err(EmitError::BodyConversion)?;

    // one response at a time on a shared channel
    let mut writer = writer.lock().await;
    futures_util::io::copy(&mut encoder, &mut *writer)
        .await
        .map_err(EmitError::ResponseSend)?;
    writer.flush().await.map_err(EmitError::ResponseSend)?;

    tracing::debug!("emitted {} response, {} body bytes", status, encoder.body_bytes_written());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Stream;
    use http::StatusCode;

    #[test]
    fn test_cgi_emitter() {
        smol::block_on(async {
            let emitter = CgiEmitter::new(Vec::new());
            let mut resp = Response::new(Stream::from("missing"));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp.headers_mut().insert("content-type", "text/plain".parse().unwrap());

            emitter.emit(resp).await.unwrap();

            let out = String::from_utf8(emitter.into_inner()).unwrap();
            assert_eq!(
                out,
                "Status: 404 Not Found\r\ncontent-length: 7\r\ncontent-type: text/plain\r\n\r\nmissing"
            );
        });
    }

    #[test]
    fn test_http1_emitter_twice() {
        smol::block_on(async {
            let emitter = Http1Emitter::new(Vec::new());
            emitter.emit(Response::new(Stream::from("one"))).await.unwrap();
            emitter.emit(Response::new(Stream::from("two"))).await.unwrap();
            assert_eq!(emitter.name(), "http_factory::emitter::Http1Emitter");

            let out = String::from_utf8(emitter.into_inner()).unwrap();
            assert_eq!(out.matches("HTTP/1.1 200 OK\r\n").count(), 2);
            assert!(out.ends_with("\r\n\r\ntwo"));
        });
    }

    #[test]
    fn test_body_error() {
        smol::block_on(async {
            let mut body = Stream::from("gone");
            body.close();
            let emitter = CgiEmitter::new(Vec::new());
            let err = emitter.emit(Response::new(body)).await.unwrap_err();
            assert!(matches!(err, EmitError::BodyConversion(_) | EmitError::ResponseSend(_)));
        });
    }
}
