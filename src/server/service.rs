use super::request::{Connection, UiRequest};
use super::response::{ResponseSession, SessionLedger};
use crate::router::RequestRouter;
use http::StatusCode;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Number of requests currently inside a handler.
#[derive(Debug, Default)]
pub struct InFlight(AtomicUsize);

impl InFlight {
    /// Requests currently between parse and reply.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn enter(&self) -> InFlightGuard<'_> {
        self.0.fetch_add(1, Ordering::AcqRel);
        InFlightGuard(self)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0 .0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// may_minihttp service shared by every connection coroutine.
///
/// Cloning is cheap: all fields are reference counted and the router is
/// immutable once the service exists.
pub struct UiService<S> {
    state: Arc<S>,
    router: Arc<RequestRouter<S>>,
    ledger: Arc<SessionLedger>,
    in_flight: Arc<InFlight>,
}

impl<S> Clone for UiService<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            router: Arc::clone(&self.router),
            ledger: Arc::clone(&self.ledger),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<S> UiService<S> {
    pub fn new(
        state: Arc<S>,
        router: Arc<RequestRouter<S>>,
        ledger: Arc<SessionLedger>,
        in_flight: Arc<InFlight>,
    ) -> Self {
        Self {
            state,
            router,
            ledger,
            in_flight,
        }
    }
}

impl<S: Send + Sync + 'static> HttpService for UiService<S> {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let _guard = self.in_flight.enter();

        let Some(request) = UiRequest::parse(req, Connection::new(Arc::clone(&self.ledger))) else {
            warn!("Unparseable HTTP request method");
            let connection = Connection::new(Arc::clone(&self.ledger));
            ResponseSession::open_error(&connection, StatusCode::INTERNAL_SERVER_ERROR)
                .finalize()
                .write_to(res);
            return Ok(());
        };

        let mut reply = match self.router.dispatch(&self.state, &request) {
            Some(reply) => reply,
            None => ResponseSession::open_error(request.connection(), StatusCode::NOT_FOUND)
                .finalize(),
        };
        let after_send = reply.take_after_send();
        reply.write_to(res);
        if let Some(action) = after_send {
            action();
        }
        Ok(())
    }
}
