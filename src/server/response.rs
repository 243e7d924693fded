use super::request::Connection;
use crate::ids::RequestId;
use http::StatusCode;
use may_minihttp::Response;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Every response allows any origin so pages and payloads can be consumed
/// from `file://` documents and other hosts.
pub const CORS_HEADER: &str = "Access-Control-Allow-Origin: *";

/// Body content types produced by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Json,
    Text,
}

impl ContentType {
    fn header(self) -> &'static str {
        match self {
            ContentType::Html => "Content-Type: text/html; charset=utf-8",
            ContentType::Json => "Content-Type: application/json",
            ContentType::Text => "Content-Type: text/plain; charset=utf-8",
        }
    }
}

/// Counters shared by all sessions of one server.
///
/// `opened` and `completed` only ever grow; a session dropped without being
/// completed bumps `leaked` instead.
#[derive(Debug, Default)]
pub struct SessionLedger {
    opened: AtomicUsize,
    completed: AtomicUsize,
    leaked: AtomicUsize,
}

impl SessionLedger {
    /// Sessions opened since the server started.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions completed through `finalize` or `fail`.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Sessions dropped without being completed.
    pub fn leaked(&self) -> usize {
        self.leaked.load(Ordering::SeqCst)
    }

    /// Sessions opened but not yet completed or leaked.
    pub fn outstanding(&self) -> usize {
        self.opened()
            .saturating_sub(self.completed() + self.leaked())
    }
}

/// One in-flight response.
///
/// Opened with [`ResponseSession::open`] (status 200) or
/// [`ResponseSession::open_error`] (given status, empty body). It must be
/// completed exactly once, through [`ResponseSession::finalize`] or
/// [`ResponseSession::fail`]; both consume the session, so writing after
/// completion does not compile. Dropping an uncompleted session is logged
/// and counted as a leak.
#[must_use = "a session must be finalized or failed"]
pub struct ResponseSession {
    status: StatusCode,
    headers: SmallVec<[&'static str; 4]>,
    body: Vec<u8>,
    request_id: RequestId,
    ledger: Arc<SessionLedger>,
    completed: bool,
}

impl ResponseSession {
    /// Open a 200 session for `connection`.
    pub fn open(connection: &Connection) -> Self {
        Self::open_with_status(connection, StatusCode::OK)
    }

    /// Open a session that answers `status`. Nothing is written to its body
    /// unless the caller does so explicitly.
    pub fn open_error(connection: &Connection, status: StatusCode) -> Self {
        Self::open_with_status(connection, status)
    }

    fn open_with_status(connection: &Connection, status: StatusCode) -> Self {
        connection.ledger().opened.fetch_add(1, Ordering::SeqCst);
        let mut headers = SmallVec::new();
        headers.push(CORS_HEADER);
        Self {
            status,
            headers,
            body: Vec::new(),
            request_id: connection.request_id(),
            ledger: Arc::clone(connection.ledger()),
            completed: false,
        }
    }

    /// Status the session will answer with unless it fails.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Set the `Content-Type` header, replacing any earlier one.
    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.headers.retain(|h| !h.starts_with("Content-Type:"));
        self.headers.push(content_type.header());
    }

    /// Append `bytes` to the buffered body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    /// Append UTF-8 text to the buffered body.
    pub fn write_str(&mut self, text: &str) {
        self.write(text.as_bytes());
    }

    /// Complete the session with everything written so far.
    pub fn finalize(mut self) -> Reply {
        self.complete(None)
    }

    /// Error-path completion: discard the buffered body and answer with a
    /// bare `status`.
    pub fn fail(mut self, status: StatusCode) -> Reply {
        self.complete(Some(status))
    }

    fn complete(&mut self, failure: Option<StatusCode>) -> Reply {
        self.completed = true;
        self.ledger.completed.fetch_add(1, Ordering::SeqCst);
        let mut headers = std::mem::take(&mut self.headers);
        let (status, body) = match failure {
            Some(status) => {
                headers.retain(|h| !h.starts_with("Content-Type:"));
                (status, Vec::new())
            }
            None => (self.status, std::mem::take(&mut self.body)),
        };
        debug!(
            request_id = %self.request_id,
            status = status.as_u16(),
            body_bytes = body.len(),
            "Response finalized"
        );
        Reply {
            status,
            headers,
            body,
            after_send: None,
        }
    }
}

impl Drop for ResponseSession {
    fn drop(&mut self) {
        if !self.completed {
            self.ledger.leaked.fetch_add(1, Ordering::SeqCst);
            error!(
                request_id = %self.request_id,
                status = self.status.as_u16(),
                "Response session dropped without being finalized"
            );
        }
    }
}

/// Work to run once a reply has been handed to the transport.
pub type AfterSend = Box<dyn FnOnce() + Send>;

/// A completed response, ready for transmission.
pub struct Reply {
    status: StatusCode,
    headers: SmallVec<[&'static str; 4]>,
    body: Vec<u8>,
    after_send: Option<AfterSend>,
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reply")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_bytes", &self.body.len())
            .field("after_send", &self.after_send.is_some())
            .finish()
    }
}

impl Reply {
    /// Final status line code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Raw `Name: value` header lines, CORS first.
    pub fn headers(&self) -> &[&'static str] {
        &self.headers
    }

    /// Attach an action to run after [`Reply::write_to`]. A later call
    /// replaces an earlier action.
    pub fn after_send(mut self, action: impl FnOnce() + Send + 'static) -> Self {
        self.after_send = Some(Box::new(action));
        self
    }

    /// Detach the post-send action, if any. The service takes it before
    /// writing and runs it once the reply is in the transport's buffer.
    pub fn take_after_send(&mut self) -> Option<AfterSend> {
        self.after_send.take()
    }

    /// Hand the reply to the transport. Delivery failures are the
    /// transport's concern and are not reported back.
    pub fn write_to(self, res: &mut Response) {
        let reason = self.status.canonical_reason().unwrap_or("Unknown");
        res.status_code(self.status.as_u16() as usize, reason);
        for header in self.headers {
            res.header(header);
        }
        res.body_vec(self.body);
    }
}
