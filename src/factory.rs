//! The single point of construction for messages, streams, uris and uploaded files, and of
//! resolution for the bound client and emitter.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::client::{Client, Http1Client};
use crate::config::{ClientKind, EmitterKind, FactoryConfig};
use crate::emitter::{CgiEmitter, Emitter, Http1Emitter};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::response::{is_valid_reason, ReasonPhrase};
use crate::server_request::{determine_method, parse_method, ServerParams, ServerRequest};
use crate::uploaded_file::{UploadedFile, UploadedFileOptions};
use crate::uri::{IntoUri, Uri};
use crate::{Request, Response, Stream};

/// Optional parts of a response. Defaults to 200 with the standard reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOptions {
    pub status: u16,
    /// Empty means the standard phrase for `status`.
    pub reason_phrase: String,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            status: 200,
            reason_phrase: String::new(),
        }
    }
}

/// Builds http messages and hands out the configured client and emitter.
///
/// Holds nothing but its configuration, so it can be cloned and shared between threads freely.
#[derive(Debug, Clone, Default)]
pub struct MessageFactory {
    config: FactoryConfig,
}

impl MessageFactory {
    pub fn new(config: FactoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// A request with an empty body.
    pub fn create_request<U: IntoUri>(&self, method: &str, uri: U) -> Result<Request> {
        let method = parse_method(method)?;
        let uri = uri.into_uri()?;

        let mut req = Request::new(Stream::empty());
        *req.method_mut() = method;
        *req.uri_mut() = uri.to_http()?;
        *req.version_mut() = self.config.version;
        req.extensions_mut().insert(uri);
        Ok(req)
    }

    /// A response with an empty body. An empty reason phrase means the standard one.
    pub fn create_response(&self, status: u16, reason_phrase: &str) -> Result<Response> {
        self.create_response_with(ResponseOptions {
            status,
            reason_phrase: reason_phrase.to_owned(),
        })
    }

    pub fn create_response_with(&self, opts: ResponseOptions) -> Result<Response> {
        if !(100..=599).contains(&opts.status) {
            tracing::debug!("rejecting status code {}", opts.status);
            return Err(Error::InvalidStatus(opts.status));
        }
        let status = http::StatusCode::from_u16(opts.status)
            .map_err(|_| Error::InvalidStatus(opts.status))?;
        if !is_valid_reason(&opts.reason_phrase) {
            tracing::debug!("rejecting reason phrase {:?}", opts.reason_phrase);
            return Err(Error::InvalidReason(opts.reason_phrase));
        }

        let mut resp = Response::new(Stream::empty());
        *resp.status_mut() = status;
        *resp.version_mut() = self.config.version;
        if !opts.reason_phrase.is_empty() {
            resp.extensions_mut().insert(ReasonPhrase(opts.reason_phrase));
        }
        Ok(resp)
    }

    /// A server request without headers or body.
    ///
    /// An empty `method` is taken from `REQUEST_METHOD` in `server_params`; if that is missing too
    /// the method cannot be determined and construction fails.
    pub fn create_server_request<U: IntoUri>(
        &self,
        method: &str,
        uri: U,
        server_params: ServerParams,
    ) -> Result<ServerRequest> {
        let method = determine_method(method, &server_params).map_err(|err| {
            tracing::debug!("server request: {}", err);
            err
        })?;
        let uri = uri.into_uri()?;

        let mut req = Request::new(Stream::empty());
        *req.method_mut() = method;
        *req.uri_mut() = uri.to_http()?;
        *req.version_mut() = self.config.version;
        req.extensions_mut().insert(uri);
        Ok(ServerRequest::new(req, server_params))
    }

    /// A server request from a captured environment, see `Environment::from_process`.
    pub fn create_server_request_from_environment(&self, env: Environment) -> Result<ServerRequest> {
        env.into_server_request(self.config.version)
    }

    pub fn create_stream(&self, content: &str) -> Stream {
        Stream::from(content)
    }

    pub fn create_stream_from_bytes(&self, content: Vec<u8>) -> Stream {
        Stream::from_bytes(content)
    }

    /// Open a file with an fopen style mode (`r`, `w`, `a`, `x`, `c`, plus `+`).
    ///
    /// An unrecognized mode is invalid input and nothing is opened. Failures of the open itself are
    /// returned as the untouched io error.
    pub fn create_stream_from_file<P: AsRef<Path>>(&self, path: P, mode: &str) -> Result<Stream> {
        Stream::open(path.as_ref(), mode).map_err(|err| {
            tracing::debug!("opening {:?} with mode {:?}: {}", path.as_ref(), mode, err);
            err
        })
    }

    /// Wrap an already open byte source. Its size is unknown.
    pub fn create_stream_from_source<R>(&self, source: R) -> Stream
    where
        R: Read + Send + Sync + 'static,
    {
        Stream::from_reader(source, None)
    }

    /// Wrap an already open file, which the stream then owns.
    pub fn create_stream_from_std_file(&self, file: File) -> Stream {
        Stream::from_file(file)
    }

    pub fn create_uri(&self, uri: &str) -> Result<Uri> {
        Uri::parse(uri)
    }

    /// An uploaded file. A `size` of `None` in `opts` is filled in from the stream.
    pub fn create_uploaded_file(&self, stream: Stream, opts: UploadedFileOptions) -> UploadedFile {
        UploadedFile::new(stream, opts)
    }

    pub fn request_class(&self) -> &'static str {
        "http::Request<http_factory::Stream>"
    }

    pub fn response_class(&self) -> &'static str {
        "http::Response<http_factory::Stream>"
    }

    pub fn server_request_class(&self) -> &'static str {
        "http_factory::ServerRequest"
    }

    pub fn stream_class(&self) -> &'static str {
        "http_factory::Stream"
    }

    pub fn uri_class(&self) -> &'static str {
        "http_factory::Uri"
    }

    pub fn uploaded_file_class(&self) -> &'static str {
        "http_factory::UploadedFile"
    }

    pub fn client_class(&self) -> &'static str {
        self.config.client.name()
    }

    pub fn emitter_class(&self) -> &'static str {
        self.config.emitter.name()
    }

    pub fn create_client(&self) -> Box<dyn Client> {
        match self.config.client {
            ClientKind::Http1 => Box::new(Http1Client::new(self.config.client_timeout)),
        }
    }

    pub fn create_emitter(&self) -> Box<dyn Emitter> {
        match self.config.emitter {
            EmitterKind::Cgi => Box::new(CgiEmitter::stdout()),
            EmitterKind::Http1 => Box::new(Http1Emitter::stdout()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::request::RequestExt;
    use crate::response::ResponseExt;
    use crate::server_request::REQUEST_METHOD;
    use crate::ErrorKind;
    use http::{Method, StatusCode, Version};

    fn params(pairs: &[(&str, &str)]) -> ServerParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_create_request() {
        let factory = MessageFactory::default();
        let req = factory.create_request("PATCH", "http://example.org/a?b=c").unwrap();
        assert_eq!(req.method(), Method::PATCH);
        assert_eq!(req.uri().to_string(), "http://example.org/a?b=c");
        assert_eq!(req.version(), Version::HTTP_11);
        assert_eq!(req.body().size(), Some(0));

        let req = factory.create_request("GET", "http://example.org").unwrap();
        assert_eq!(req.uri_reference().to_string(), "http://example.org");
        assert_eq!(req.uri().to_string(), "http://example.org/");

        assert_eq!(factory.create_request("", "/").unwrap_err().kind(), ErrorKind::InvalidInput);
        assert_eq!(factory.create_request("GET", "1:bad").unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_create_response() {
        let factory = MessageFactory::default();
        let resp = factory.create_response_with(ResponseOptions::default()).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.reason_phrase(), "OK");

        let resp = factory.create_response(404, "").unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.reason_phrase(), "Not Found");

        let resp = factory.create_response(418, "Short and stout").unwrap();
        assert_eq!(resp.reason_phrase(), "Short and stout");

        let err = factory.create_response(200, "OK\r\nSet-Cookie: evil=1").unwrap_err();
        assert!(matches!(err, Error::InvalidReason(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(factory.create_response(200, "nul\0").is_err());

        assert!(matches!(factory.create_response(99, ""), Err(Error::InvalidStatus(99))));
        assert!(matches!(factory.create_response(600, ""), Err(Error::InvalidStatus(600))));
    }

    #[test]
    fn test_create_server_request() {
        let factory = MessageFactory::default();
        let err = factory.create_server_request("", "/", params(&[])).unwrap_err();
        assert!(err.is_invalid_input());

        let req = factory
            .create_server_request("", "/", params(&[(REQUEST_METHOD, "POST")]))
            .unwrap();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.version(), Version::HTTP_11);
        assert!(req.headers().is_empty());
        assert_eq!(req.body().size(), Some(0));

        let req = factory
            .create_server_request("GET", "/", params(&[(REQUEST_METHOD, "POST")]))
            .unwrap();
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.server_param(REQUEST_METHOD), Some("POST"));

        let req = factory
            .create_server_request("GET", "https://example.org?x=1#part", params(&[]))
            .unwrap();
        assert_eq!(req.uri_reference().to_string(), "https://example.org?x=1#part");
    }

    #[test]
    fn test_class_accessors() {
        let factory = MessageFactory::default();
        assert_eq!(factory.client_class(), factory.create_client().name());
        assert_eq!(factory.emitter_class(), factory.create_emitter().name());
        assert_eq!(factory.emitter_class(), "http_factory::emitter::CgiEmitter");

        let factory = MessageFactory::new(FactoryConfig {
            emitter: EmitterKind::Http1,
            ..Default::default()
        });
        assert_eq!(factory.emitter_class(), factory.create_emitter().name());
        assert_eq!(factory.stream_class(), "http_factory::Stream");
    }
}
