use http::Response as HttpResponse;

use crate::stream::Stream;

/// Currently, Response is not generic over the body type
pub type Response = HttpResponse<Stream>;

/// A reason phrase set explicitly at construction.
///
/// Stored in the response extensions; when absent the canonical phrase of the status is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(pub String);

/// Reason phrase access for `Response`.
pub trait ResponseExt {
    /// The custom reason phrase, else the canonical one for the status, else "".
    fn reason_phrase(&self) -> &str;
}

impl<B> ResponseExt for HttpResponse<B> {
    fn reason_phrase(&self) -> &str {
        match self.extensions().get::<ReasonPhrase>() {
            Some(ReasonPhrase(phrase)) if is_valid_reason(phrase) => phrase,
            _ => self.status().canonical_reason().unwrap_or(""),
        }
    }
}

/// A reason phrase may hold tabs, spaces, visible ascii and obs-text, never line breaks or other
/// control bytes.
pub(crate) fn is_valid_reason(phrase: &str) -> bool {
    phrase
        .bytes()
        .all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f))
}
