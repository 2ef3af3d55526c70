use futures_util::io::AsyncRead;
use http::{header, Method};
use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::error::{self, ClientError};
use crate::{Request, Stream};

/// An HTTP request encoder.
#[doc(hidden)]
#[derive(Debug)]
pub struct Encoder {
    /// Keep track how far we've indexed into the headers + body.
    cursor: usize,
    /// HTTP headers to be sent.
    headers: Vec<u8>,
    /// Check whether we're done sending headers.
    headers_done: bool,
    /// HTTP body to be sent.
    body: Stream,
    /// Check whether we're done with the body.
    body_done: bool,
    /// Keep track of how many bytes have been read from the body stream.
    body_bytes_read: u64,
    /// The content-length that was announced.
    body_length: u64,
}

impl Encoder {
    /// Encode an HTTP request on the client.
    pub fn encode(req: Request) -> Result<Self, ClientError> {
        let (parts, body) = req.into_parts();
        let (body, length) = prepare_body(body)?;
        let mut buf: Vec<u8> = Vec::new();

        // clients are not supposed to send uri frags when retrieving a document, the Uri
        // conversion already dropped it. Skip to query.
        let mut url = parts.uri.path().to_owned();
        if let Some(query) = parts.uri.query() {
            url.push('?');
            url.push_str(query);
        }

        // A client sending a CONNECT request MUST consists of only the host
        // name and port number of the tunnel destination, separated by a colon.
        // See: https://tools.ietf.org/html/rfc7231#section-4.3.6
        if parts.method == Method::CONNECT {
            let host = parts.uri.host();
            let host = host.ok_or_else(|| error::encode("Missing hostname".to_owned()))?;
            let port = parts.uri.port_u16();
            let port = port.ok_or_else(|| error::encode("Missing port".to_owned()))?;
            url = format!("{}:{}", host, port);
        }

        let val = format!("{} {} HTTP/1.1\r\n", parts.method, url);
        tracing::trace!("> {}", &val);
        buf.write_all(val.as_bytes()).map_err(error::encode_io)?;

        if parts.headers.get(header::HOST).is_none() {
            let host = parts.uri.host();
            let host = host.ok_or_else(|| error::encode("Missing hostname".to_owned()))?;
            let val = if let Some(port) = parts.uri.port_u16() {
                format!("host: {}:{}\r\n", host, port)
            } else {
                format!("host: {}\r\n", host)
            };

            tracing::trace!("> {}", &val);
            buf.write_all(val.as_bytes()).map_err(error::encode_io)?;
        }

        // Insert Proxy-Connection header when method is CONNECT
        if parts.method == Method::CONNECT {
            let val = "proxy-connection: keep-alive\r\n".to_owned();
            tracing::trace!("> {}", &val);
            buf.write_all(val.as_bytes()).map_err(error::encode_io)?;
        }

        let val = format!("content-length: {}\r\n", length);
        tracing::trace!("> {}", &val);
        buf.write_all(val.as_bytes()).map_err(error::encode_io)?;

        // body framing is ours, drop whatever the caller set
        let headers = parts
            .headers
            .iter()
            .filter(|(h, _)| **h != header::CONTENT_LENGTH)
            .filter(|(h, _)| **h != header::TRANSFER_ENCODING);
        for (header, value) in headers {
            buf.write_all(header.as_str().as_bytes()).map_err(error::encode_io)?;
            buf.write_all(b": ").map_err(error::encode_io)?;
            buf.write_all(value.as_bytes()).map_err(error::encode_io)?;
            buf.write_all(b"\r\n").map_err(error::encode_io)?;
        }

        buf.write_all(b"\r\n").map_err(error::encode_io)?;

        Ok(Self {
            body,
            headers: buf,
            cursor: 0,
            headers_done: false,
            body_done: length == 0,
            body_bytes_read: 0,
            body_length: length,
        })
    }
}

/// Rewind seekable bodies and find out how much will be sent. Bodies of unknown size are read into
/// memory, so that the request can always go out with a content-length.
fn prepare_body(mut body: Stream) -> Result<(Stream, u64), ClientError> {
    if body.is_seekable() {
        body.rewind().map_err(error::encode_io)?;
    }
    match body.size() {
        Some(len) => Ok((body, len)),
        None => {
            let bytes = body.to_bytes().map_err(error::encode_io)?;
            let len = bytes.len() as u64;
            Ok((Stream::from_bytes(bytes), len))
        }
    }
}

impl AsyncRead for Encoder {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        // Send the headers. As long as the headers aren't fully sent yet we
        // keep sending more of the headers.
        let mut bytes_read = 0;
        if !self.headers_done {
            let len = std::cmp::min(self.headers.len() - self.cursor, buf.len());
            let range = self.cursor..self.cursor + len;
            buf[0..len].copy_from_slice(&self.headers[range]);
            self.cursor += len;
            if self.cursor == self.headers.len() {
                self.headers_done = true;
            }
            bytes_read += len;
        }

        if self.headers_done && !self.body_done && bytes_read < buf.len() {
            // never send more than announced, even if a file grew meanwhile
            let remaining = self.body_length - self.body_bytes_read;
            let upper = std::cmp::min(buf.len(), bytes_read + remaining as usize);
            let inner_poll_result = Pin::new(&mut self.body).poll_read(cx, &mut buf[bytes_read..upper]);
            let n = match inner_poll_result {
                Poll::Ready(Ok(n)) => n,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {
                    if bytes_read == 0 {
                        return Poll::Pending;
                    } else {
                        return Poll::Ready(Ok(bytes_read));
                    }
                }
            };
            bytes_read += n;
            self.body_bytes_read += n as u64;
            if n == 0 || self.body_bytes_read == self.body_length {
                self.body_done = true;
            }
        }

        Poll::Ready(Ok(bytes_read))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_util::io::AsyncReadExt;

    fn encode_to_string(req: Request) -> String {
        smol::block_on(async {
            let mut encoder = Encoder::encode(req).unwrap();
            let mut out = String::new();
            encoder.read_to_string(&mut out).await.unwrap();
            out
        })
    }

    #[test]
    fn test_encode_with_body() {
        let req = http::Request::builder()
            .method("POST")
            .uri("http://example.org:8080/submit?x=1")
            .header("content-length", "999")
            .body(Stream::from("hello"))
            .unwrap();

        assert_eq!(
            encode_to_string(req),
            "POST /submit?x=1 HTTP/1.1\r\nhost: example.org:8080\r\ncontent-length: 5\r\n\r\nhello"
        );
    }

    #[test]
    fn test_encode_unknown_length_body() {
        let body = Stream::from_reader(io::Cursor::new(b"streamed".to_vec()), None);
        let req = http::Request::builder()
            .method("PUT")
            .uri("http://example.org/up")
            .body(body)
            .unwrap();

        assert_eq!(
            encode_to_string(req),
            "PUT /up HTTP/1.1\r\nhost: example.org\r\ncontent-length: 8\r\n\r\nstreamed"
        );
    }

    #[test]
    fn test_encode_missing_host() {
        let req = http::Request::builder().uri("/no/host").body(Stream::empty()).unwrap();
        assert!(Encoder::encode(req).unwrap_err().is_encode());
    }
}
