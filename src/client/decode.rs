#![allow(clippy::nonminimal_bool)]
#![allow(clippy::op_ref)]

use futures_io::AsyncRead;
use futures_util::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use http::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING},
    StatusCode, Version,
};

use super::error::{self, ClientError};
use crate::response::ReasonPhrase;
use crate::{Response, Stream};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const MAX_HEADERS: usize = 128;
const MAX_HEAD_LENGTH: usize = 8 * 1024;
const MAX_CHUNK_LINE: u64 = 1024;
const MAX_PREALLOC: u64 = 64 * 1024;

/// Decode an HTTP response on the client.
///
/// The body is read into memory. `head_request` marks a response to HEAD, which never has one.
#[doc(hidden)]
pub async fn decode<R>(reader: R, head_request: bool) -> Result<Response, ClientError>
where
    R: AsyncRead + Unpin + Send + Sync + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut httparse_res = httparse::Response::new(&mut headers);

    // Keep reading bytes from the stream until we hit the end of the stream.
    loop {
        // never buffer past the head limit, even within one line
        let limit = (MAX_HEAD_LENGTH - buf.len()) as u64;
        let bytes_read = (&mut reader)
            .take(limit)
            .read_until(LF, &mut buf)
            .await
            .map_err(error::decode_err)?;
        // No more bytes are yielded from the stream.
        if !(bytes_read != 0) {
            return Err(error::decode("Empty response".to_owned()));
        }

        // Prevent CWE-400 DDOS with large HTTP Headers.
        if !(buf.len() < MAX_HEAD_LENGTH) {
            return Err(error::decode(
                "Head byte length should be less than 8kb".to_owned(),
            ));
        };

        // We've hit the end delimiter of the stream.
        let idx = buf.len() - 1;
        if idx >= 3 && &buf[idx - 3..=idx] == [CR, LF, CR, LF] {
            break;
        }
        if idx >= 1 && &buf[idx - 1..=idx] == [LF, LF] {
            break;
        }
    }

    // Convert our header buf into an httparse instance, and validate.
    let status = httparse_res.parse(&buf).map_err(error::decode_err)?;
    if status.is_partial() {
        return Err(error::decode("Malformed HTTP head".to_owned()));
    };

    let code = httparse_res.code;
    let code = code.ok_or_else(|| error::decode("No status code found".to_owned()))?;
    let status = StatusCode::from_u16(code).map_err(error::decode_err)?;

    let version = httparse_res.version;
    let version = version.ok_or_else(|| error::decode("No version found".to_owned()))?;
    let version = match version {
        0 => Version::HTTP_10,
        1 => Version::HTTP_11,
        _ => return Err(error::decode("Unsupported HTTP version".to_owned())),
    };

    let mut headers = HeaderMap::new();
    for header in httparse_res.headers.iter() {
        let value = HeaderValue::from_bytes(header.value).map_err(error::decode_err)?;
        let name: HeaderName = header.name.parse().map_err(error::decode_err)?;
        headers.append(name, value);
    }

    let content_length = headers.get(CONTENT_LENGTH);
    let transfer_encoding = headers.get(TRANSFER_ENCODING);

    if !(content_length.is_none() || transfer_encoding.is_none()) {
        return Err(error::decode("Unexpected Content-Length header".to_owned()));
    };

    let no_body = head_request
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED;

    let body = if no_body {
        Vec::new()
    } else if is_chunked(&headers) {
        read_chunked(&mut reader).await?
    } else if let Some(len) = headers.get(CONTENT_LENGTH) {
        let len = len
            .to_str()
            .map_err(error::decode_err)?
            .trim()
            .parse::<u64>()
            .map_err(error::decode_err)?;
        // the length is untrusted, only preallocate a bounded amount
        let mut body = Vec::with_capacity(std::cmp::min(len, MAX_PREALLOC) as usize);
        (&mut reader)
            .take(len)
            .read_to_end(&mut body)
            .await
            .map_err(error::decode_err)?;
        if (body.len() as u64) < len {
            return Err(error::decode("Body shorter than Content-Length".to_owned()));
        }
        body
    } else {
        // delimited by connection close
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.map_err(error::decode_err)?;
        body
    };

    let mut res = Response::new(Stream::from_bytes(body));
    *res.status_mut() = status;
    *res.version_mut() = version;
    *res.headers_mut() = headers;
    if let Some(reason) = httparse_res.reason {
        if Some(reason) != status.canonical_reason() {
            res.extensions_mut().insert(ReasonPhrase(reason.to_owned()));
        }
    }

    Ok(res)
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .last()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .map(|v| v.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

/// Read a chunked body to the end, discarding any trailers.
async fn read_chunked<R>(reader: &mut R) -> Result<Vec<u8>, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        (&mut *reader)
            .take(MAX_CHUNK_LINE)
            .read_until(LF, &mut line)
            .await
            .map_err(error::decode_err)?;
        if line.last() != Some(&LF) {
            return Err(error::decode("Truncated or oversized chunk size line".to_owned()));
        }
        let size_line = std::str::from_utf8(&line).map_err(error::decode_err)?;
        // chunk extensions follow a ';'
        let size = size_line.split(';').next().unwrap_or("").trim();
        let size = u64::from_str_radix(size, 16)
            .map_err(|_| error::decode(format!("Invalid chunk size {:?}", size)))?;

        if size == 0 {
            // trailers, up to an empty line
            loop {
                line.clear();
                let n = (&mut *reader)
                    .take(MAX_CHUNK_LINE)
                    .read_until(LF, &mut line)
                    .await
                    .map_err(error::decode_err)?;
                if n == 0 || line == b"\r\n" || line == b"\n" {
                    return Ok(body);
                }
                if line.last() != Some(&LF) {
                    return Err(error::decode("Oversized trailer line".to_owned()));
                }
            }
        }

        let start = body.len();
        (&mut *reader)
            .take(size)
            .read_to_end(&mut body)
            .await
            .map_err(error::decode_err)?;
        if ((body.len() - start) as u64) < size {
            return Err(error::decode("Truncated chunk".to_owned()));
        }

        line.clear();
        (&mut *reader)
            .take(MAX_CHUNK_LINE)
            .read_until(LF, &mut line)
            .await
            .map_err(error::decode_err)?;
        if line != b"\r\n" && line != b"\n" {
            return Err(error::decode("Missing chunk delimiter".to_owned()));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::ResponseExt;

    fn decode_str(raw: &'static str) -> Result<Response, ClientError> {
        smol::block_on(decode(futures_util::io::Cursor::new(raw.as_bytes()), false))
    }

    #[test]
    fn test_decode_fixed() {
        let mut res = decode_str("HTTP/1.1 200 OK\r\ncontent-length: 6\r\nx-a: b\r\n\r\nstream").unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-a"], "b");
        assert_eq!(res.reason_phrase(), "OK");
        assert_eq!(res.body_mut().contents().unwrap(), "stream");
    }

    #[test]
    fn test_decode_chunked() {
        let mut res = decode_str(
            "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n3\r\nstr\r\n3;ext=1\r\neam\r\n0\r\nx-trailer: 1\r\n\r\n",
        )
        .unwrap();
        assert_eq!(res.body_mut().contents().unwrap(), "stream");
    }

    #[test]
    fn test_decode_custom_reason() {
        let res = decode_str("HTTP/1.1 404 Nope\r\ncontent-length: 0\r\n\r\n").unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.reason_phrase(), "Nope");
    }

    #[test]
    fn test_decode_failures() {
        assert!(decode_str("").unwrap_err().is_decode());
        assert!(decode_str("HTTP/1.1 200 OK\r\ncontent-length: 10\r\n\r\nshort").unwrap_err().is_decode());
        assert!(decode_str("HTTP/1.1 200 OK\r\ncontent-length: 1\r\ntransfer-encoding: chunked\r\n\r\n")
            .unwrap_err()
            .is_decode());
    }

    #[test]
    fn test_decode_huge_content_length() {
        let err = decode_str("HTTP/1.1 200 OK\r\ncontent-length: 18446744073709551615\r\n\r\nabc")
            .unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_decode_head_too_long() {
        // one endless header line, no newline anywhere
        let mut raw = b"HTTP/1.1 200 OK\r\nx-long: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(64 * 1024));
        let res = smol::block_on(decode(futures_util::io::Cursor::new(raw), false));
        assert!(res.unwrap_err().is_decode());
    }

    #[test]
    fn test_decode_chunk_size_line_too_long() {
        let mut raw = b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n".to_vec();
        raw.extend(std::iter::repeat(b'0').take(4 * 1024));
        raw.extend_from_slice(b"1\r\na\r\n0\r\n\r\n");
        let res = smol::block_on(decode(futures_util::io::Cursor::new(raw), false));
        assert!(res.unwrap_err().is_decode());
    }
}
