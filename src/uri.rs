//! Uri reference with all five components.
//!
//! `http::Uri` is what goes on the wire and has no room for a fragment or for relative references
//! like `foo/bar`, so the factory keeps its own component form and converts when a message is
//! built.

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed uri reference: scheme, authority, path, query and fragment.
///
/// The empty string is a valid (empty) reference. Scheme and host are normalized to lowercase and
/// the default port of the scheme is dropped, so parse-then-display is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uri {
    scheme: Option<String>,
    authority: Option<Authority>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Authority {
    userinfo: Option<String>,
    host: String,
    port: Option<u16>,
}

impl Uri {
    /// Parse a uri reference, following the component split of RFC 3986 appendix B.
    pub fn parse(input: &str) -> Result<Self> {
        if let Some(c) = input.chars().find(|c| c.is_ascii_control() || *c == ' ') {
            return Err(Error::invalid_uri(input, format!("illegal character {:?}", c)));
        }

        let mut rest = input;
        let mut uri = Uri::default();

        // fragment first, it may contain any of the other delimiters
        if let Some(i) = rest.find('#') {
            uri.fragment = Some(rest[i + 1..].to_owned());
            rest = &rest[..i];
        }
        if let Some(i) = rest.find('?') {
            uri.query = Some(rest[i + 1..].to_owned());
            rest = &rest[..i];
        }

        // a scheme is whatever precedes the first ':' as long as no '/' comes before it
        if let Some(i) = rest.find(|c| c == ':' || c == '/') {
            if rest.as_bytes()[i] == b':' {
                let scheme = &rest[..i];
                if !is_valid_scheme(scheme) {
                    return Err(Error::invalid_uri(input, "invalid scheme"));
                }
                uri.scheme = Some(scheme.to_ascii_lowercase());
                rest = &rest[i + 1..];
            }
        }

        if let Some(after) = rest.strip_prefix("//") {
            let end = after.find('/').unwrap_or_else(|| after.len());
            uri.authority = Some(
                Authority::parse(&after[..end])
                    .map_err(|reason| Error::invalid_uri(input, reason))?,
            );
            rest = &after[end..];
        }

        uri.path = rest.to_owned();
        Ok(uri)
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// `[userinfo@]host[:port]`, or None when the reference has no authority.
    pub fn authority(&self) -> Option<String> {
        self.authority.as_ref().map(|a| a.render(self.scheme()))
    }

    pub fn user_info(&self) -> Option<&str> {
        self.authority.as_ref().and_then(|a| a.userinfo.as_deref())
    }

    pub fn host(&self) -> Option<&str> {
        self.authority.as_ref().map(|a| a.host.as_str())
    }

    /// The port, unless it is the default port of the scheme.
    pub fn port(&self) -> Option<u16> {
        let port = self.authority.as_ref().and_then(|a| a.port)?;
        if default_port(self.scheme()) == Some(port) {
            None
        } else {
            Some(port)
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn is_absolute(&self) -> bool {
        self.scheme.is_some()
    }

    pub fn with_scheme(mut self, scheme: &str) -> Result<Self> {
        if scheme.is_empty() {
            self.scheme = None;
        } else if is_valid_scheme(scheme) {
            self.scheme = Some(scheme.to_ascii_lowercase());
        } else {
            return Err(Error::invalid_uri(scheme, "invalid scheme"));
        }
        Ok(self)
    }

    pub fn with_host(mut self, host: &str) -> Result<Self> {
        if host.is_empty() {
            self.authority = None;
            return Ok(self);
        }
        let checked = Authority::parse(host).map_err(|reason| Error::invalid_uri(host, reason))?;
        if checked.userinfo.is_some() || checked.port.is_some() {
            return Err(Error::invalid_uri(host, "host must not carry userinfo or port"));
        }
        let mut authority = self.authority.take().unwrap_or_default();
        authority.host = checked.host;
        self.authority = Some(authority);
        Ok(self)
    }

    pub fn with_port(mut self, port: Option<u16>) -> Result<Self> {
        match self.authority.as_mut() {
            Some(authority) => authority.port = port,
            None if port.is_none() => {}
            None => return Err(Error::invalid_uri(self.to_string(), "port without host")),
        }
        Ok(self)
    }

    pub fn with_path(mut self, path: &str) -> Result<Self> {
        if path.contains(|c| c == '?' || c == '#') {
            return Err(Error::invalid_uri(path, "path must not contain '?' or '#'"));
        }
        if self.authority.is_some() && !path.is_empty() && !path.starts_with('/') {
            return Err(Error::invalid_uri(path, "path must start with '/' when an authority is present"));
        }
        self.path = path.to_owned();
        Ok(self)
    }

    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query.map(|q| q.trim_start_matches('?').to_owned());
        self
    }

    pub fn with_fragment(mut self, fragment: Option<&str>) -> Self {
        self.fragment = fragment.map(|f| f.trim_start_matches('#').to_owned());
        self
    }

    /// Convert to the wire form used by `http::Request`. The fragment is dropped, since it is never
    /// sent, and an empty path becomes `/`.
    pub fn to_http(&self) -> Result<http::Uri> {
        let mut wire = String::new();
        if let Some(scheme) = &self.scheme {
            wire.push_str(scheme);
            wire.push(':');
        }
        if let Some(authority) = self.authority() {
            wire.push_str("//");
            wire.push_str(&authority);
        }
        if self.path.is_empty() {
            wire.push('/');
        } else {
            wire.push_str(&self.path);
        }
        if let Some(query) = &self.query {
            wire.push('?');
            wire.push_str(query);
        }
        wire.parse::<http::Uri>()
            .map_err(|err| Error::invalid_uri(self.to_string(), err))
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{}:", scheme)?;
        }
        if let Some(authority) = self.authority() {
            write!(f, "//{}", authority)?;
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

impl<'a> TryFrom<&'a str> for Uri {
    type Error = Error;

    fn try_from(s: &'a str) -> Result<Self> {
        Uri::parse(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Uri::parse(&s)
    }
}

impl TryFrom<&Uri> for http::Uri {
    type Error = Error;

    fn try_from(uri: &Uri) -> Result<http::Uri> {
        uri.to_http()
    }
}

impl From<&http::Uri> for Uri {
    fn from(uri: &http::Uri) -> Self {
        let authority = uri.authority().map(|a| Authority {
            userinfo: a
                .as_str()
                .rfind('@')
                .map(|i| a.as_str()[..i].to_owned()),
            host: a.host().to_ascii_lowercase(),
            port: a.port_u16(),
        });
        Uri {
            scheme: uri.scheme_str().map(str::to_ascii_lowercase),
            authority,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            fragment: None,
        }
    }
}

/// Anything the factory accepts where a uri is expected.
pub trait IntoUri {
    fn into_uri(self) -> Result<Uri>;
}

impl IntoUri for Uri {
    fn into_uri(self) -> Result<Uri> {
        Ok(self)
    }
}

impl<'a> IntoUri for &'a Uri {
    fn into_uri(self) -> Result<Uri> {
        Ok(self.clone())
    }
}

impl<'a> IntoUri for &'a str {
    fn into_uri(self) -> Result<Uri> {
        Uri::parse(self)
    }
}

impl IntoUri for String {
    fn into_uri(self) -> Result<Uri> {
        Uri::parse(&self)
    }
}

impl<'a> IntoUri for &'a http::Uri {
    fn into_uri(self) -> Result<Uri> {
        Ok(Uri::from(self))
    }
}

impl IntoUri for http::Uri {
    fn into_uri(self) -> Result<Uri> {
        Ok(Uri::from(&self))
    }
}

impl Authority {
    fn parse(input: &str) -> std::result::Result<Self, String> {
        if input.is_empty() {
            // e.g. file:///etc/hosts
            return Ok(Authority::default());
        }
        let checked = input
            .parse::<http::uri::Authority>()
            .map_err(|err| err.to_string())?;

        let (userinfo, hostport) = match input.rfind('@') {
            Some(i) => (Some(input[..i].to_owned()), &input[i + 1..]),
            None => (None, input),
        };

        // a ':' inside brackets belongs to an ipv6 literal
        let port_sep = match hostport.rfind(']') {
            Some(close) => hostport[close..].find(':').map(|i| i + close),
            None => hostport.rfind(':'),
        };
        let port = match port_sep {
            Some(i) if i + 1 < hostport.len() => Some(
                hostport[i + 1..]
                    .parse::<u16>()
                    .map_err(|_| "invalid port".to_owned())?,
            ),
            _ => None,
        };

        Ok(Authority {
            userinfo,
            host: checked.host().to_ascii_lowercase(),
            port,
        })
    }

    fn render(&self, scheme: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(userinfo) = &self.userinfo {
            out.push_str(userinfo);
            out.push('@');
        }
        out.push_str(&self.host);
        if let Some(port) = self.port {
            if default_port(scheme) != Some(port) {
                out.push(':');
                out.push_str(&port.to_string());
            }
        }
        out
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        }
        _ => false,
    }
}

fn default_port(scheme: Option<&str>) -> Option<u16> {
    match scheme? {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}
