//! HTTP plumbing for the coordinator UI.
//!
//! - [`request`] turns a raw may_minihttp request into a [`UiRequest`]
//! - [`response`] provides the one-shot [`ResponseSession`] and its [`Reply`]
//! - [`service`] is the may_minihttp service that routes every connection
//! - [`http_server`] binds the listener and hands back a [`ServerHandle`]

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{Connection, HeaderVec, ParamVec, UiRequest};
pub use response::{ContentType, Reply, ResponseSession, SessionLedger, CORS_HEADER};
pub use service::{InFlight, UiService};
