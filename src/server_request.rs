use http::{HeaderMap, Method, Version};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::request::{Request, RequestExt};
use crate::stream::Stream;
use crate::uploaded_file::UploadedFile;
use crate::uri::Uri;

/// Server parameters, e.g. CGI style variables describing the invoking environment.
pub type ServerParams = HashMap<String, String>;

/// Key in `ServerParams` holding the request method.
pub const REQUEST_METHOD: &str = "REQUEST_METHOD";

/// An incoming request, plus what the server knows about it.
///
/// Query params are parsed from the uri at construction. Cookies, uploaded files, a parsed body
/// and attributes are attached by whoever builds the request.
#[derive(Debug)]
pub struct ServerRequest {
    request: Request,
    server_params: ServerParams,
    cookie_params: HashMap<String, String>,
    query_params: Vec<(String, String)>,
    uploaded_files: HashMap<String, UploadedFile>,
    parsed_body: Option<Vec<(String, String)>>,
    attributes: HashMap<String, String>,
}

impl ServerRequest {
    pub fn new(request: Request, server_params: ServerParams) -> Self {
        let query_params = request
            .uri()
            .query()
            .map(parse_query)
            .unwrap_or_default();

        Self {
            request,
            server_params,
            cookie_params: HashMap::new(),
            query_params,
            uploaded_files: HashMap::new(),
            parsed_body: None,
            attributes: HashMap::new(),
        }
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &http::Uri {
        self.request.uri()
    }

    /// The uri as given at construction, fragment included.
    pub fn uri_reference(&self) -> Cow<'_, Uri> {
        self.request.uri_reference()
    }

    pub fn version(&self) -> Version {
        self.request.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.request.headers_mut()
    }

    pub fn body(&self) -> &Stream {
        self.request.body()
    }

    pub fn body_mut(&mut self) -> &mut Stream {
        self.request.body_mut()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn server_params(&self) -> &ServerParams {
        &self.server_params
    }

    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params.get(name).map(String::as_str)
    }

    pub fn cookie_params(&self) -> &HashMap<String, String> {
        &self.cookie_params
    }

    pub fn with_cookie_params(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookie_params = cookies;
        self
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// First value of a query param.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn with_query_params(mut self, params: Vec<(String, String)>) -> Self {
        self.query_params = params;
        self
    }

    pub fn uploaded_files(&self) -> &HashMap<String, UploadedFile> {
        &self.uploaded_files
    }

    pub fn uploaded_files_mut(&mut self) -> &mut HashMap<String, UploadedFile> {
        &mut self.uploaded_files
    }

    pub fn with_uploaded_files(mut self, files: HashMap<String, UploadedFile>) -> Self {
        self.uploaded_files = files;
        self
    }

    pub fn parsed_body(&self) -> Option<&[(String, String)]> {
        self.parsed_body.as_deref()
    }

    pub fn with_parsed_body(mut self, body: Option<Vec<(String, String)>>) -> Self {
        self.parsed_body = body;
        self
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn with_attribute<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn without_attribute(mut self, name: &str) -> Self {
        self.attributes.remove(name);
        self
    }
}

/// The explicit method wins; an empty one falls back to `REQUEST_METHOD`.
pub(crate) fn determine_method(method: &str, server_params: &ServerParams) -> Result<Method> {
    let method = if !method.is_empty() {
        method
    } else {
        match server_params.get(REQUEST_METHOD) {
            Some(m) if !m.is_empty() => m.as_str(),
            _ => return Err(Error::UndeterminedMethod),
        }
    };
    parse_method(method)
}

pub(crate) fn parse_method(method: &str) -> Result<Method> {
    if method.is_empty() {
        return Err(Error::InvalidMethod(String::new()));
    }
    Method::from_bytes(method.as_bytes()).map_err(|_| Error::InvalidMethod(method.to_owned()))
}

/// Parse an `application/x-www-form-urlencoded` string, keeping order and repeats.
pub(crate) fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
