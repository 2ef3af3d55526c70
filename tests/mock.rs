#![allow(dead_code)] // not every test binary uses every helper

//! Test Server for testing the client
//! Test Output for testing emitters

use futures_io::{AsyncRead, AsyncWrite};
use futures_util::future::BoxFuture;
use http_factory::client::{Connection, Connector};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// A remote host which answers with a canned response and records what the client sent.
#[derive(Clone)]
pub struct Server {
    // bool is true once the response has been read
    read_buf: Arc<Mutex<(Vec<u8>, bool)>>,
    write_buf: Arc<Mutex<Vec<u8>>>,
    expected: Vec<u8>,
}

impl Server {
    pub fn new(expected_req: &str, resp: &str) -> Self {
        Self {
            read_buf: Arc::new(Mutex::new((resp.to_owned().into_bytes(), false))),
            write_buf: Arc::new(Mutex::new(Vec::new())),
            expected: expected_req.to_owned().into_bytes(),
        }
    }

    pub fn received(&self) -> String {
        String::from_utf8(self.write_buf.lock().unwrap().clone()).unwrap()
    }

    pub fn assert(self) {
        assert_eq!(self.received(), String::from_utf8(self.expected).unwrap());
    }
}

impl AsyncRead for Server {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut rdr = self.read_buf.lock().unwrap();
        if !rdr.1 {
            rdr.1 = true;
            let n = io::Read::read(&mut io::Cursor::new(&*rdr.0), buf)?;
            Poll::Ready(Ok(n))
        } else {
            Poll::Ready(Ok(0))
        }
    }
}

impl AsyncWrite for Server {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.write_buf.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Hands out the same mock server for every connection.
pub struct ServerConnector {
    pub server: Server,
}

impl Connector for ServerConnector {
    fn connect<'a>(&'a self, _uri: &'a http::Uri) -> BoxFuture<'a, io::Result<Box<dyn Connection>>> {
        let server = self.server.clone();
        Box::pin(async move { Ok(Box::new(server) as Box<dyn Connection>) })
    }
}

/// Never connects.
pub struct PendingConnector;

impl Connector for PendingConnector {
    fn connect<'a>(&'a self, _uri: &'a http::Uri) -> BoxFuture<'a, io::Result<Box<dyn Connection>>> {
        Box::pin(futures_util::future::pending())
    }
}

/// Refuses every connection.
pub struct RefusingConnector;

impl Connector for RefusingConnector {
    fn connect<'a>(&'a self, _uri: &'a http::Uri) -> BoxFuture<'a, io::Result<Box<dyn Connection>>> {
        Box::pin(async { Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")) })
    }
}

/// Shared output channel for emitters, readable after the emitter is gone.
#[derive(Clone, Default)]
pub struct Output {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Output {
    pub fn contents(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }

    pub fn contents_without_date(&self) -> String {
        String::from_utf8(remove_date(&self.buf.lock().unwrap())).unwrap()
    }
}

impl AsyncWrite for Output {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// just strip date from response
fn remove_date(b: &[u8]) -> Vec<u8> {
    let s = std::str::from_utf8(b).unwrap();
    if let Some(i) = s.find("date: ") {
        let eol = s[i + 6..].find("\r\n").expect("missing date eol");
        let mut res = Vec::new();
        res.extend_from_slice(&b[..i]);
        res.extend_from_slice(&b[i + 6 + eol + 2..]);
        res
    } else {
        b.to_vec()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_remove_date() {
        let input =
            b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\ndate: Thu, 07 May 2020 15:54:21 GMT\r\n\r\n";
        let expected = b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n";

        assert_eq!(
            String::from_utf8(remove_date(input)),
            String::from_utf8(expected.to_vec())
        );
    }
}
