use http::Request as HttpRequest;
use std::borrow::Cow;

use crate::stream::Stream;
use crate::uri::Uri;

/// Currently, Request is not generic over the body type
pub type Request = HttpRequest<Stream>;

/// Access to the uri a request was created with.
///
/// `http::Uri` normalizes (an empty path becomes `/`) and cannot hold a fragment, so the factory
/// keeps the parsed `Uri` in the request extensions as well.
pub trait RequestExt {
    /// The uri exactly as given at construction. Falls back to the request target when the
    /// target was replaced afterwards or the request was not built by the factory.
    fn uri_reference(&self) -> Cow<'_, Uri>;
}

impl<B> RequestExt for HttpRequest<B> {
    fn uri_reference(&self) -> Cow<'_, Uri> {
        match self.extensions().get::<Uri>() {
            Some(uri) if uri.to_http().ok().as_ref() == Some(self.uri()) => Cow::Borrowed(uri),
            _ => Cow::Owned(Uri::from(self.uri())),
        }
    }
}
