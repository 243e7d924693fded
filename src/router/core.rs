use crate::server::{Reply, ResponseSession, UiRequest};
use http::{Method, StatusCode};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// A handler produces exactly one completed [`Reply`] per request.
pub type Handler<S> = Box<dyn Fn(&S, &UiRequest) -> Reply + Send + Sync>;

/// Why a request was refused before reaching its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MethodNotAllowed(Method),
    MissingParam(&'static str),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MethodNotAllowed(m) => write!(f, "method {m} not allowed"),
            Rejection::MissingParam(p) => write!(f, "missing required parameter `{p}`"),
        }
    }
}

/// Preconditions a request must satisfy before its handler runs.
#[derive(Debug, Clone)]
pub struct RouteRule {
    methods: SmallVec<[Method; 2]>,
    required: SmallVec<[&'static str; 2]>,
}

impl RouteRule {
    /// Accept any of `methods`, with no required parameters yet.
    pub fn methods(methods: &[Method]) -> Self {
        Self {
            methods: methods.iter().cloned().collect(),
            required: SmallVec::new(),
        }
    }

    /// GET only.
    pub fn get() -> Self {
        Self::methods(&[Method::GET])
    }

    /// POST only.
    pub fn post() -> Self {
        Self::methods(&[Method::POST])
    }

    /// Declare a parameter that must be present. There is no default value:
    /// absence is always a protocol error.
    pub fn require(mut self, name: &'static str) -> Self {
        self.required.push(name);
        self
    }

    /// Method first, then required parameters in declaration order.
    pub fn check(&self, req: &UiRequest) -> Result<(), Rejection> {
        if !self.methods.contains(req.method()) {
            return Err(Rejection::MethodNotAllowed(req.method().clone()));
        }
        if let Some(missing) = self.required.iter().find(|p| req.param(p).is_none()) {
            return Err(Rejection::MissingParam(*missing));
        }
        Ok(())
    }
}

struct Route<S> {
    rule: RouteRule,
    handler: Handler<S>,
}

/// Exact-path router over handlers that share a state `S`.
pub struct RequestRouter<S> {
    routes: HashMap<String, Route<S>>,
}

impl<S> Default for RequestRouter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> RequestRouter<S> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Associate `pattern` with `handler`. Registering the same pattern twice
    /// replaces the earlier handler.
    pub fn register<F>(&mut self, pattern: &str, rule: RouteRule, handler: F) -> &mut Self
    where
        F: Fn(&S, &UiRequest) -> Reply + Send + Sync + 'static,
    {
        let route = Route {
            rule,
            handler: Box::new(handler),
        };
        if self.routes.insert(pattern.to_string(), route).is_some() {
            warn!(pattern = %pattern, "Route registered twice; keeping the latest handler");
        }
        self
    }

    /// Registered patterns, sorted.
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        patterns.sort_unstable();
        patterns
    }

    /// Route `req` to its handler.
    ///
    /// Returns `None` when no pattern matches; the caller decides what the
    /// not-found response looks like.
    pub fn dispatch(&self, state: &S, req: &UiRequest) -> Option<Reply> {
        let Some(route) = self.routes.get(req.path()) else {
            warn!(
                request_id = %req.connection().request_id(),
                method = %req.method(),
                path = %req.path(),
                "No route matched"
            );
            return None;
        };

        info!(
            request_id = %req.connection().request_id(),
            path = %req.path(),
            "Serving request"
        );

        if let Err(rejection) = route.rule.check(req) {
            warn!(
                request_id = %req.connection().request_id(),
                path = %req.path(),
                reason = %rejection,
                "Request rejected"
            );
            return Some(
                ResponseSession::open_error(req.connection(), StatusCode::INTERNAL_SERVER_ERROR)
                    .finalize(),
            );
        }

        Some((route.handler)(state, req))
    }
}
