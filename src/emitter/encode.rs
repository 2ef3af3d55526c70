use futures_io::AsyncRead;
use http::{header, HeaderMap, StatusCode, Version};
use httpdate::fmt_http_date;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::response::ResponseExt;
use crate::{Response, Stream};

/// How the response head is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeadStyle {
    /// `HTTP/1.1 200 OK`, with date and body framing headers.
    Http1,
    /// `Status: 200 OK`, for a CGI gateway that does its own framing.
    Cgi,
}

// smallest window a chunk is worth writing into: size line, one byte, crlf
const MIN_CHUNK_WINDOW: usize = 16;

/// Turns a Response into bytes, as an AsyncRead.
pub(crate) struct Encoder {
    style: HeadStyle,
    status: StatusCode,
    reason: String,
    version: Version,
    headers: HeaderMap,
    body: Stream,
    state: EncoderState,

    // Tracks bytes read across one Encoder poll_read, which may span
    // several calls of encoding methods
    bytes_read: usize,

    head_buf: Vec<u8>,
    head_bytes_read: usize,

    content_length: Option<u64>,
    body_bytes_read: u64,
    // 1xx, 204 and 304 never carry a body or its framing
    bodiless: bool,

    chunk_buf: Vec<u8>,
}

impl Encoder {
    pub(crate) fn encode(resp: Response, style: HeadStyle) -> std::io::Result<Self> {
        let reason = resp.reason_phrase().to_owned();
        let (parts, mut body) = resp.into_parts();

        // emit from the start, whatever the caller read already
        if body.is_seekable() {
            body.rewind().map_err(into_io)?;
        }
        let content_length = body.size();

        Ok(Self {
            style,
            status: parts.status,
            reason,
            version: parts.version,
            headers: parts.headers,
            body,
            state: EncoderState::Start,
            bytes_read: 0,
            head_buf: Vec::new(),
            head_bytes_read: 0,
            content_length,
            body_bytes_read: 0,
            bodiless: parts.status.is_informational()
                || parts.status == StatusCode::NO_CONTENT
                || parts.status == StatusCode::NOT_MODIFIED,
            chunk_buf: Vec::new(),
        })
    }

    /// At start, prep headers for writing
    fn start(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
        let headers = self.headers.iter()
            .filter(|(h, _)| **h != header::CONTENT_LENGTH)
            .filter(|(h, _)| **h != header::TRANSFER_ENCODING);

        match self.style {
            HeadStyle::Http1 => {
                write!(&mut self.head_buf, "{:?} {} {}\r\n", self.version, self.status.as_u16(), self.reason)?;
                match (self.bodiless, self.content_length) {
                    (true, _) => {}
                    (false, Some(len)) => write!(&mut self.head_buf, "content-length: {}\r\n", len)?,
                    (false, None) => write!(&mut self.head_buf, "transfer-encoding: chunked\r\n")?,
                }
                if !self.headers.contains_key(header::DATE) {
                    let date = fmt_http_date(std::time::SystemTime::now());
                    write!(&mut self.head_buf, "date: {}\r\n", date)?;
                }
            }
            HeadStyle::Cgi => {
                write!(&mut self.head_buf, "Status: {} {}\r\n", self.status.as_u16(), self.reason)?;
                if let Some(len) = self.content_length {
                    write!(&mut self.head_buf, "content-length: {}\r\n", len)?;
                }
            }
        }
        for (header, value) in headers {
            // write broken up, because value may contain opaque bytes.
            write!(&mut self.head_buf, "{}: ", header)?;
            self.head_buf.write_all(value.as_bytes())?;
            self.head_buf.write_all(b"\r\n")?;
        }
        self.head_buf.write_all(b"\r\n")?;
        tracing::trace!("emitting head: {:?}", String::from_utf8_lossy(&self.head_buf));

        // Now everything's prepped, on to sending the header
        self.state = EncoderState::Head;
        self.encode_head(cx, buf)
    }

    fn encode_head(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
        // Each read is not guaranteed to read the entire head_buf. So we keep track of our place
        // if the read is partial, so that it can be continued on the next poll.
        let len = std::cmp::min(self.head_buf.len() - self.head_bytes_read, buf.len());
        let range = self.head_bytes_read..self.head_bytes_read + len;
        buf[0..len].copy_from_slice(&self.head_buf[range]);
        self.bytes_read += len;
        self.head_bytes_read += len;

        // if entire head_buf is read, continue to body encoding, else keep state and return
        // Poll::Ready for this iteration
        if self.head_bytes_read == self.head_buf.len() {
            if self.bodiless && self.style == HeadStyle::Http1 {
                self.state = EncoderState::Done;
                return Poll::Ready(Ok(self.bytes_read));
            }
            match (self.content_length, self.style) {
                (Some(_), _) => {
                    self.state = EncoderState::FixedBody;
                    self.encode_fixed_body(cx, buf)
                }
                (None, HeadStyle::Http1) => {
                    self.state = EncoderState::ChunkedBody;
                    tracing::trace!("response encoding: chunked body");
                    self.encode_chunked_body(cx, buf)
                }
                (None, HeadStyle::Cgi) => {
                    self.state = EncoderState::RawBody;
                    self.encode_raw_body(cx, buf)
                }
            }
        } else {
            Poll::Ready(Ok(self.bytes_read))
        }
    }

    fn encode_fixed_body(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
        // Remember that from here, the buf has not been cleared yet, so consider the head as the
        // first part of the buf.
        let content_length = self.content_length.unwrap_or(0);
        if content_length == self.body_bytes_read {
            self.state = EncoderState::Done;
            return Poll::Ready(Ok(self.bytes_read));
        }

        // first check that there's more room in buffer
        if self.bytes_read == buf.len() {
            return Poll::Ready(Ok(self.bytes_read));
        }

        // Copy to to buf the shorter of (remaining body + any previous reads) or buf
        let remaining = (content_length - self.body_bytes_read) as usize;
        let upper_limit = std::cmp::min(self.bytes_read + remaining, buf.len());
        let range = self.bytes_read..upper_limit;
        match Pin::new(&mut self.body).poll_read(cx, &mut buf[range]) {
            Poll::Ready(Ok(0)) => {
                return Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "body ended before its announced length",
                )));
            }
            Poll::Ready(Ok(n)) => {
                self.bytes_read += n;
                self.body_bytes_read += n as u64;
            }
            Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
            Poll::Pending => {
                return match self.bytes_read {
                    0 => Poll::Pending,
                    n => Poll::Ready(Ok(n)),
                };
            }
        }

        // if entire resp is read, finish. Else return Poll::Ready for another iteration
        self.encode_fixed_body(cx, buf)
    }

    /// Encode a body of unknown length using "chunked" framing.
    fn encode_chunked_body(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
        let window = buf.len() - self.bytes_read;
        if window < MIN_CHUNK_WINDOW {
            if self.bytes_read > 0 {
                return Poll::Ready(Ok(self.bytes_read));
            }
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "read buffer too small for a chunk",
            )));
        }

        // size line is at most 16 hex digits + crlf, plus crlf after the data
        let max_data = window.saturating_sub(20).max(1);
        self.chunk_buf.resize(max_data, 0);
        let n = match Pin::new(&mut self.body).poll_read(cx, &mut self.chunk_buf) {
            Poll::Ready(Ok(n)) => n,
            Poll::Ready(Err(err)) => return Poll::Ready(Err(err)),
            Poll::Pending => {
                return match self.bytes_read {
                    0 => Poll::Pending,
                    n => Poll::Ready(Ok(n)),
                };
            }
        };

        let mut out = &mut buf[self.bytes_read..];
        let before = out.len();
        if n == 0 {
            out.write_all(b"0\r\n\r\n")?;
            self.state = EncoderState::Done;
        } else {
            write!(out, "{:x}\r\n", n)?;
            out.write_all(&self.chunk_buf[..n])?;
            out.write_all(b"\r\n")?;
            self.body_bytes_read += n as u64;
        }
        self.bytes_read += before - out.len();
        Poll::Ready(Ok(self.bytes_read))
    }

    /// Copy the body as is until it ends.
    fn encode_raw_body(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<std::io::Result<usize>> {
        if self.bytes_read == buf.len() {
            return Poll::Ready(Ok(self.bytes_read));
        }
        let range = self.bytes_read..buf.len();
        match Pin::new(&mut self.body).poll_read(cx, &mut buf[range]) {
            Poll::Ready(Ok(0)) => {
                self.state = EncoderState::Done;
                Poll::Ready(Ok(self.bytes_read))
            }
            Poll::Ready(Ok(n)) => {
                self.bytes_read += n;
                self.body_bytes_read += n as u64;
                Poll::Ready(Ok(self.bytes_read))
            }
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => match self.bytes_read {
                0 => Poll::Pending,
                n => Poll::Ready(Ok(n)),
            },
        }
    }

    pub(crate) fn body_bytes_written(&self) -> u64 {
        self.body_bytes_read
    }
}

impl AsyncRead for Encoder {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        // bytes_read is per call to poll_read for Encoder
        self.bytes_read = 0;

        use EncoderState::*;
        match self.state {
            Start => self.start(cx, buf),
            Head => self.encode_head(cx, buf),
            FixedBody => self.encode_fixed_body(cx, buf),
            ChunkedBody => self.encode_chunked_body(cx, buf),
            RawBody => self.encode_raw_body(cx, buf),
            Done => Poll::Ready(Ok(0)),
        }
    }
}

#[derive(Debug)]
enum EncoderState {
    Start,
    Head,
    FixedBody,
    ChunkedBody,
    RawBody,
    Done,
}

fn into_io(err: crate::Error) -> std::io::Error {
    match err {
        crate::Error::Io(err) => err,
        other => std::io::Error::new(std::io::ErrorKind::Other, other),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures_util::io::AsyncReadExt;

    fn encode_to_string(resp: Response, style: HeadStyle) -> String {
        smol::block_on(async {
            let mut encoder = Encoder::encode(resp, style).unwrap();
            let mut out = String::new();
            encoder.read_to_string(&mut out).await.unwrap();
            out
        })
    }

    fn remove_date(s: String) -> String {
        match s.find("date: ") {
            Some(i) => {
                let eol = s[i..].find("\r\n").expect("missing date eol");
                format!("{}{}", &s[..i], &s[i + eol + 2..])
            }
            None => s,
        }
    }

    #[test]
    fn test_fixed_body() {
        let mut resp = Response::new(Stream::from("Hello worlds"));
        resp.headers_mut().insert("x-test", "1".parse().unwrap());
        resp.headers_mut().insert(header::CONTENT_LENGTH, "999".parse().unwrap());

        assert_eq!(
            remove_date(encode_to_string(resp, HeadStyle::Http1)),
            "HTTP/1.1 200 OK\r\ncontent-length: 12\r\nx-test: 1\r\n\r\nHello worlds"
        );
    }

    #[test]
    fn test_chunked_body() {
        let body = Stream::from_reader(std::io::Cursor::new(b"streamed".to_vec()), None);
        let resp = Response::new(body);

        assert_eq!(
            remove_date(encode_to_string(resp, HeadStyle::Http1)),
            "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n8\r\nstreamed\r\n0\r\n\r\n"
        );
    }

    #[test]
    fn test_bodiless_status_has_no_framing() {
        for code in &[100u16, 204, 304] {
            let mut resp = Response::new(Stream::from("ignored"));
            *resp.status_mut() = StatusCode::from_u16(*code).unwrap();
            resp.headers_mut().insert(header::ETAG, "\"v1\"".parse().unwrap());

            let out = remove_date(encode_to_string(resp, HeadStyle::Http1));
            let reason = StatusCode::from_u16(*code).unwrap().canonical_reason().unwrap();
            assert_eq!(out, format!("HTTP/1.1 {} {}\r\netag: \"v1\"\r\n\r\n", code, reason));
        }
    }

    #[test]
    fn test_cgi_head() {
        let mut resp = Response::new(Stream::from_reader(std::io::Cursor::new(b"raw".to_vec()), None));
        *resp.status_mut() = StatusCode::NOT_FOUND;

        assert_eq!(encode_to_string(resp, HeadStyle::Cgi), "Status: 404 Not Found\r\n\r\nraw");
    }

    #[test]
    fn test_rewinds_body() {
        let mut body = Stream::from("abc");
        body.contents().unwrap();
        let resp = Response::new(body);

        assert_eq!(
            encode_to_string(resp, HeadStyle::Cgi),
            "Status: 200 OK\r\ncontent-length: 3\r\n\r\nabc"
        );
    }
}
