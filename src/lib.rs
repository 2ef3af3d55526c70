#![deny(unsafe_code)]

//! # http-factory
//!
//! A factory for http messages: requests, responses, server requests, uris, streams and uploaded
//! files. The factory also hands out the configured `Client` for sending requests and `Emitter`
//! for writing responses.
//!
//! ```no_run
//! use http_factory::{MessageFactory, ResponseExt};
//!
//! let factory = MessageFactory::default();
//! let req = factory.create_request("GET", "http://example.org/").unwrap();
//! let resp = factory.create_response(404, "").unwrap();
//! assert_eq!(resp.reason_phrase(), "Not Found");
//! # drop(req);
//! ```

pub mod client;
mod config;
pub mod emitter;
mod environment;
mod error;
mod factory;
mod request;
mod response;
mod server_request;
mod stream;
mod timeout;
mod uploaded_file;
mod uri;

pub use client::{Client, ClientError, Http1Client};
pub use config::{ClientKind, EmitterKind, FactoryConfig};
pub use emitter::{CgiEmitter, EmitError, Emitter, Http1Emitter};
pub use environment::Environment;
pub use error::{Error, ErrorKind, Result};
pub use factory::{MessageFactory, ResponseOptions};
pub use request::{Request, RequestExt};
pub use response::{ReasonPhrase, Response, ResponseExt};
pub use server_request::{ServerParams, ServerRequest, REQUEST_METHOD};
pub use stream::Stream;
pub use uploaded_file::{UploadError, UploadedFile, UploadedFileOptions};
pub use uri::{IntoUri, Uri};
pub use http;
