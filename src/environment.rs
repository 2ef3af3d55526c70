//! Captured snapshot of the environment an incoming request arrived in.
//!
//! Reading process globals happens once, in `Environment::from_process`, and only when the caller
//! asks for it. Everything downstream works on the snapshot.

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Version};
use std::collections::HashMap;

use crate::error::Result;
use crate::server_request::{parse_method, ServerParams, ServerRequest, REQUEST_METHOD};
use crate::stream::Stream;
use crate::uploaded_file::UploadedFile;
use crate::uri::Uri;

/// CGI style variables, body and uploaded files of a request.
#[derive(Debug)]
pub struct Environment {
    vars: ServerParams,
    body: Stream,
    uploaded_files: HashMap<String, UploadedFile>,
}

impl Environment {
    pub fn new<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            body: Stream::empty(),
            uploaded_files: HashMap::new(),
        }
    }

    /// Capture the current process: environment variables, and stdin as the body.
    pub fn from_process() -> Self {
        // non-unicode variables cannot be server params, skip them
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        let mut env = Self::new(vars);
        let len = env
            .vars
            .get("CONTENT_LENGTH")
            .and_then(|l| l.trim().parse::<u64>().ok());
        env.body = Stream::from_reader(std::io::Read::take(std::io::stdin(), len.unwrap_or(u64::MAX)), len);
        env
    }

    pub fn with_body<B: Into<Stream>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_uploaded_file<S: Into<String>>(mut self, field: S, file: UploadedFile) -> Self {
        self.uploaded_files.insert(field.into(), file);
        self
    }

    pub fn server_params(&self) -> &ServerParams {
        &self.vars
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// `REQUEST_METHOD`, defaulting to GET.
    pub fn method(&self) -> Result<Method> {
        match self.var(REQUEST_METHOD) {
            Some(m) => parse_method(m),
            None => Ok(Method::GET),
        }
    }

    /// `HTTP_*` variables plus the content headers, which CGI passes without the prefix.
    pub fn headers(&self) -> Result<HeaderMap> {
        // sorted, so the header order does not depend on hashing
        let mut vars: Vec<_> = self.vars.iter().collect();
        vars.sort();

        let mut headers = HeaderMap::new();
        for (key, value) in vars {
            let name = if let Some(name) = key.strip_prefix("HTTP_") {
                name
            } else if key == "CONTENT_TYPE" || key == "CONTENT_LENGTH" || key == "CONTENT_MD5" {
                key.as_str()
            } else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let name = HeaderName::from_bytes(name.replace('_', "-").to_ascii_lowercase().as_bytes())?;
            headers.append(name, HeaderValue::from_str(value)?);
        }
        Ok(headers)
    }

    /// Rebuild the request uri from `HTTPS`, `HTTP_HOST`/`SERVER_NAME`/`SERVER_ADDR`,
    /// `SERVER_PORT`, `REQUEST_URI` and `QUERY_STRING`.
    pub fn uri(&self) -> Result<Uri> {
        let https = self
            .var("HTTPS")
            .map(|v| !v.eq_ignore_ascii_case("off"))
            .unwrap_or(false);
        let scheme = if https { "https" } else { "http" };

        let mut has_port = false;
        let host = if let Some(host) = self.var("HTTP_HOST") {
            has_port = host.rsplit(']').next().map(|h| h.contains(':')).unwrap_or(false);
            Some(host.to_owned())
        } else {
            self.var("SERVER_NAME").or_else(|| self.var("SERVER_ADDR")).map(str::to_owned)
        };

        let mut has_query = false;
        let mut path = String::from("/");
        let mut query = None;
        if let Some(request_uri) = self.var("REQUEST_URI") {
            let mut parts = request_uri.splitn(2, '?');
            path = parts.next().unwrap_or("/").to_owned();
            if let Some(q) = parts.next() {
                has_query = true;
                query = Some(q.to_owned());
            }
        }
        if !has_query {
            query = self.var("QUERY_STRING").map(str::to_owned);
        }

        let mut uri = String::new();
        if let Some(host) = host {
            uri.push_str(scheme);
            uri.push_str("://");
            uri.push_str(&host);
            if !has_port {
                if let Some(port) = self.var("SERVER_PORT") {
                    uri.push(':');
                    uri.push_str(port);
                }
            }
        }
        uri.push_str(&path);
        if let Some(query) = query {
            uri.push('?');
            uri.push_str(&query);
        }
        Uri::parse(&uri)
    }

    /// `SERVER_PROTOCOL`, or `default` when missing or unknown.
    pub fn version(&self, default: Version) -> Version {
        match self.var("SERVER_PROTOCOL") {
            Some("HTTP/1.0") => Version::HTTP_10,
            Some("HTTP/1.1") => Version::HTTP_11,
            Some("HTTP/2") | Some("HTTP/2.0") => Version::HTTP_2,
            _ => default,
        }
    }

    pub(crate) fn into_server_request(self, default_version: Version) -> Result<ServerRequest> {
        let method = self.method()?;
        let headers = self.headers()?;
        let uri = self.uri()?;
        let version = self.version(default_version);
        let cookies = parse_cookies(&headers);

        let mut request = http::Request::new(self.body);
        *request.method_mut() = method;
        *request.uri_mut() = uri.to_http()?;
        request.extensions_mut().insert(uri);
        *request.version_mut() = version;
        *request.headers_mut() = headers;

        Ok(ServerRequest::new(request, self.vars)
            .with_cookie_params(cookies)
            .with_uploaded_files(self.uploaded_files))
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let value = match value.to_str() {
            Ok(v) => v,
            Err(_) => continue,
        };
        for pair in value.split(';') {
            match cookie::Cookie::parse(pair.trim()) {
                Ok(c) => {
                    cookies.insert(c.name().to_owned(), c.value().to_owned());
                }
                Err(err) => tracing::debug!("skipping malformed cookie {:?}: {}", pair, err),
            }
        }
    }
    cookies
}
