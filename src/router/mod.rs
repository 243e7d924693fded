//! # Router Module
//!
//! Maps request paths to handlers. Patterns are literal paths matched
//! exactly; there is no wildcard or prefix matching and no catch-all, an
//! unmatched path is left to the server's own not-found response.
//!
//! Each route carries a [`RouteRule`] declaring the methods it accepts and the
//! parameters it requires. The router checks the rule before invoking the
//! handler, so a handler only runs for well-formed requests; a request that
//! breaks the rule is answered with a bare 500 and nothing else happens.
//!
//! Routes are registered once at startup. The router is then moved into an
//! `Arc` and shared read-only by every connection, which is what makes
//! concurrent mutation impossible rather than merely discouraged.
//!
//! ```rust,ignore
//! let mut router = RequestRouter::new();
//! router.register("/task/", RouteRule::get().require("id"), handle_task);
//! let reply = router.dispatch(&state, &request);
//! ```

mod core;

pub use core::{Handler, Rejection, RequestRouter, RouteRule};
