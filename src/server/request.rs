use super::response::SessionLedger;
use crate::ids::RequestId;
use http::Method;
use smallvec::SmallVec;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Maximum inline parameters/headers before spilling to the heap.
pub const MAX_INLINE_PARAMS: usize = 8;
pub const MAX_INLINE_HEADERS: usize = 16;

pub type ParamVec = SmallVec<[(String, String); MAX_INLINE_PARAMS]>;
pub type HeaderVec = SmallVec<[(String, String); MAX_INLINE_HEADERS]>;

/// The connection a request arrived on, as far as response bookkeeping is
/// concerned: a correlation id and the ledger every session reports to.
#[derive(Clone, Debug)]
pub struct Connection {
    request_id: RequestId,
    ledger: Arc<SessionLedger>,
}

impl Connection {
    /// A connection with a fresh request id, reporting to `ledger`.
    pub fn new(ledger: Arc<SessionLedger>) -> Self {
        Self {
            request_id: RequestId::new(),
            ledger,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn ledger(&self) -> &Arc<SessionLedger> {
        &self.ledger
    }
}

/// An inbound request with query-string and form parameters merged into one
/// lookup table.
#[derive(Debug, Clone)]
pub struct UiRequest {
    method: Method,
    path: String,
    headers: HeaderVec,
    params: ParamVec,
    connection: Connection,
}

impl UiRequest {
    /// Build a request directly; `target` may carry a query string.
    pub fn new(method: Method, target: &str, connection: Connection) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path: path.to_string(),
            headers: HeaderVec::new(),
            params: parse_form(query),
            connection,
        }
    }

    /// Add a header (name is stored lowercase).
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Merge a form-encoded body into the parameter table.
    pub fn with_form_body(mut self, body: &str) -> Self {
        self.params.extend(parse_form(body));
        self
    }

    /// Extract method, path, headers and parameters from a raw
    /// `may_minihttp` request.
    ///
    /// Returns `None` when the method token is not a valid HTTP method.
    pub fn parse(req: may_minihttp::Request, connection: Connection) -> Option<Self> {
        let method = Method::from_bytes(req.method().as_bytes()).ok()?;
        let target = req.path().to_string();
        let headers: HeaderVec = req
            .headers()
            .iter()
            .map(|h| {
                (
                    h.name.to_ascii_lowercase(),
                    String::from_utf8_lossy(h.value).to_string(),
                )
            })
            .collect();

        let mut request = UiRequest {
            headers,
            ..UiRequest::new(method, &target, connection)
        };

        let is_form = request
            .header("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let mut body = String::new();
        if let Ok(size) = req.body().read_to_string(&mut body) {
            if size > 0 && is_form {
                request = request.with_form_body(&body);
            }
        }

        debug!(
            request_id = %request.connection.request_id(),
            method = %request.method,
            path = %request.path,
            param_count = request.params.len(),
            "HTTP request parsed"
        );
        Some(request)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Identity and session ledger for responses to this request.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Look up a query or form parameter. The last occurrence wins.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Best-effort description of the client, from proxy headers.
    pub fn peer(&self) -> &str {
        self.header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| self.header("x-real-ip"))
            .unwrap_or("unknown")
    }
}

fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (if path.is_empty() { "/" } else { path }, query),
        None => (if target.is_empty() { "/" } else { target }, ""),
    }
}

fn parse_form(input: &str) -> ParamVec {
    url::form_urlencoded::parse(input.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
