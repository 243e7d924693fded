//! # Lifecycle
//!
//! [`LifecycleController`] owns the HTTP server from `init` to teardown.
//!
//! ```text
//! Uninitialized --init--> Listening --shutdown(false)--> StoppingNonBlocking --+
//!                             |                                                |
//!                             +-----shutdown(true)--> StoppingBlocking <-------+
//!                                                           |
//!                                                        Stopped
//! ```
//!
//! Two callers stop the server. The owner calls [`LifecycleController::teardown`]
//! and wants the blocking path: cancel, join, drain. The `/shutdown/` handler
//! runs inside the server it stops, so it may only take the non-blocking
//! path; joining there would wait on itself. Both consult the same
//! [`ActiveToken`] and only the caller that flips it issues the stop. The
//! state transitions are compare-and-swap, so a server is stopped once even
//! if both race.

use crate::config::UiConfig;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::handlers::{build_router, UiState};
use crate::server::{HttpServer, InFlight, ServerHandle, SessionLedger, UiService};
use crate::view::ViewRenderer;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Where a [`LifecycleController`]'s server is in its life.
///
/// `StoppingNonBlocking` is not transient: the listener is cancelled but its
/// join handle is still held, and the state stays put until
/// [`LifecycleController::teardown`] or a blocking
/// [`LifecycleController::shutdown`] reaps it and moves on to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerLifecycleState {
    /// Not started, or `init` failed.
    Uninitialized = 0,
    Listening = 1,
    /// Listener cancelled, not yet joined.
    StoppingNonBlocking = 2,
    /// A blocking stop is joining and draining.
    StoppingBlocking = 3,
    Stopped = 4,
}

impl ServerLifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Listening,
            2 => Self::StoppingNonBlocking,
            3 => Self::StoppingBlocking,
            4 => Self::Stopped,
            _ => Self::Uninitialized,
        }
    }
}

impl fmt::Display for ServerLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Single-write "server is genuinely up" flag shared by every path that may
/// stop the server.
#[derive(Debug, Clone)]
pub struct ActiveToken(Arc<AtomicBool>);

impl Default for ActiveToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveToken {
    /// A fresh, set token.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// Whether no caller has claimed the stop yet.
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the flag. Returns `true` for exactly one caller: the one that
    /// observed it set.
    pub fn deactivate(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

struct Shared {
    state: AtomicU8,
    handle: Mutex<Option<ServerHandle>>,
    in_flight: Arc<InFlight>,
    drain_timeout: Duration,
}

impl Shared {
    fn state(&self) -> ServerLifecycleState {
        ServerLifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: ServerLifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: ServerLifecycleState, to: ServerLifecycleState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stop accepting and return. The join handle stays behind for the
    /// blocking path to reap.
    fn stop_nonblocking(&self) {
        // Transition and cancel under the handle lock so the blocking path
        // never sees StoppingNonBlocking before the listener is cancelled.
        let guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.transition(ServerLifecycleState::Listening, ServerLifecycleState::StoppingNonBlocking) {
            debug!(state = %self.state(), "Non-blocking stop ignored");
            return;
        }
        info!("Coordinator HTTP UI server shutting down on request");
        if let Some(handle) = guard.as_ref() {
            handle.cancel();
        }
    }

    fn stop_blocking(&self) {
        let (handle, was_listening) = {
            let mut guard = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
            let was_listening = self
                .transition(ServerLifecycleState::Listening, ServerLifecycleState::StoppingBlocking);
            if !was_listening
                && !self.transition(
                    ServerLifecycleState::StoppingNonBlocking,
                    ServerLifecycleState::StoppingBlocking,
                )
            {
                debug!(state = %self.state(), "Blocking stop ignored");
                return;
            }
            (guard.take(), was_listening)
        };
        info!("Coordinator HTTP UI server shutting down");

        if let Some(handle) = handle {
            if was_listening {
                handle.cancel();
            }
            handle.join();
        }
        self.drain();
        self.set(ServerLifecycleState::Stopped);
        debug!("HTTP UI shut down");
    }

    fn drain(&self) {
        let deadline = Instant::now() + self.drain_timeout;
        while self.in_flight.count() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    in_flight = self.in_flight.count(),
                    "Drain timeout reached with requests still in flight"
                );
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Lets a request handler ask the server it runs in to stop, without owning
/// it. The hook a controller hands out holds the server weakly; once the
/// controller is gone it does nothing.
#[derive(Clone, Default)]
pub struct StopHook(Option<Arc<dyn Fn() + Send + Sync>>);

impl fmt::Debug for StopHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StopHook")
            .field(&self.0.is_some())
            .finish()
    }
}

impl StopHook {
    /// A hook attached to no server.
    pub fn detached() -> Self {
        Self(None)
    }

    /// A hook that calls `stop` each time a stop is requested.
    pub fn new(stop: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(stop)))
    }

    fn for_server(shared: Weak<Shared>) -> Self {
        Self::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.stop_nonblocking();
            }
        })
    }

    /// Non-blocking stop of the owning server.
    pub fn request_stop(&self) {
        if let Some(stop) = &self.0 {
            stop();
        }
    }
}

/// Owns one coordinator UI server from `init` to teardown.
pub struct LifecycleController {
    coordinator: Arc<dyn Coordinator>,
    renderer: Arc<ViewRenderer>,
    token: ActiveToken,
    config: UiConfig,
    ledger: Arc<SessionLedger>,
    shared: Arc<Shared>,
    init_called: AtomicBool,
    addr: Mutex<Option<SocketAddr>>,
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("state", &self.state())
            .field("addr", &self.addr())
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    /// A controller in `Uninitialized`. Nothing listens until
    /// [`LifecycleController::init`].
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        renderer: Arc<ViewRenderer>,
        token: ActiveToken,
        config: UiConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(ServerLifecycleState::Uninitialized as u8),
            handle: Mutex::new(None),
            in_flight: Arc::new(InFlight::default()),
            drain_timeout: config.drain_timeout(),
        });
        Self {
            coordinator,
            renderer,
            token,
            config,
            ledger: Arc::new(SessionLedger::default()),
            shared,
            init_called: AtomicBool::new(false),
            addr: Mutex::new(None),
        }
    }

    /// Register every endpoint and start listening on `port`.
    ///
    /// # Errors
    ///
    /// [`crate::UiError::Startup`] if the socket cannot be acquired. The
    /// controller then stays `Uninitialized` for good; there is no retry.
    ///
    /// # Panics
    ///
    /// When called a second time on the same controller.
    #[allow(clippy::panic)]
    pub fn init(&self, port: u16) -> Result<()> {
        if self.init_called.swap(true, Ordering::AcqRel) {
            error!("Trying to initialize an HTTP server that has already been initialized");
            panic!("LifecycleController::init called twice");
        }

        let state = UiState {
            coordinator: Arc::clone(&self.coordinator),
            renderer: Arc::clone(&self.renderer),
            token: self.token.clone(),
            stop: StopHook::for_server(Arc::downgrade(&self.shared)),
        };
        let service = UiService::new(
            Arc::new(state),
            Arc::new(build_router()),
            Arc::clone(&self.ledger),
            Arc::clone(&self.shared.in_flight),
        );

        let handle = match HttpServer(service).start((self.config.host.as_str(), port)) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed running the coordinator's HTTP UI");
                return Err(e);
            }
        };

        let addr = handle.addr();
        *self.addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(addr);
        {
            let mut guard = self.shared.handle.lock().unwrap_or_else(PoisonError::into_inner);
            *guard = Some(handle);
            self.shared.set(ServerLifecycleState::Listening);
        }
        info!(addr = %addr, "Coordinator HTTP interface up");
        Ok(())
    }

    /// Stop accepting connections. With `blocking`, also join the listener
    /// and wait (bounded by the drain timeout) for in-flight requests.
    pub fn shutdown(&self, blocking: bool) {
        if blocking {
            self.shared.stop_blocking();
        } else {
            self.shared.stop_nonblocking();
        }
    }

    /// Owner-side teardown. Safe to call more than once.
    ///
    /// Clears the token, then runs a blocking stop. If the shutdown handler
    /// cleared the token first, its own non-blocking stop may not have run
    /// yet; the blocking stop does not wait for it. It cancels the listener
    /// itself and the drain covers the handler's request, after which the
    /// handler's late stop finds the server `Stopped` and does nothing.
    pub fn teardown(&self) {
        if !self.token.deactivate() {
            debug!("Active token already cleared; reaping the server");
        }
        self.shared.stop_blocking();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerLifecycleState {
        self.shared.state()
    }

    /// The token shared with the `/shutdown/` handler.
    pub fn token(&self) -> &ActiveToken {
        &self.token
    }

    /// Bound address, once `init` has succeeded.
    pub fn addr(&self) -> Option<SocketAddr> {
        *self.addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Response-session counters of this server.
    pub fn sessions(&self) -> &Arc<SessionLedger> {
        &self.ledger
    }

    /// Requests currently being handled.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.count()
    }

    /// Block until the listener accepts TCP connections.
    pub fn wait_ready(&self) -> io::Result<()> {
        let Some(addr) = self.addr() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "server not started"));
        };
        ServerHandle::wait_ready_at(addr)
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if self.state() != ServerLifecycleState::Uninitialized {
            self.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_deactivates_once() {
        let token = ActiveToken::new();
        let other = token.clone();
        assert!(token.is_active());
        assert!(other.deactivate());
        assert!(!token.deactivate());
        assert!(!token.is_active());
    }

    #[test]
    fn test_token_single_winner_under_race() {
        let token = ActiveToken::new();
        let winners: usize = (0..8)
            .map(|_| {
                let t = token.clone();
                thread::spawn(move || t.deactivate())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_state_roundtrip() {
        for s in [
            ServerLifecycleState::Uninitialized,
            ServerLifecycleState::Listening,
            ServerLifecycleState::StoppingNonBlocking,
            ServerLifecycleState::StoppingBlocking,
            ServerLifecycleState::Stopped,
        ] {
            assert_eq!(ServerLifecycleState::from_u8(s as u8), s);
        }
    }

    #[test]
    fn test_detached_hook_is_noop() {
        StopHook::detached().request_stop();
    }

    fn listening_shared() -> Arc<Shared> {
        Arc::new(Shared {
            state: AtomicU8::new(ServerLifecycleState::Listening as u8),
            handle: Mutex::new(None),
            in_flight: Arc::new(InFlight::default()),
            drain_timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn test_server_hook_stops_without_blocking() {
        let shared = listening_shared();
        let hook = StopHook::for_server(Arc::downgrade(&shared));
        hook.request_stop();
        assert_eq!(shared.state(), ServerLifecycleState::StoppingNonBlocking);
        // Stays there until a blocking stop reaps it.
        hook.request_stop();
        assert_eq!(shared.state(), ServerLifecycleState::StoppingNonBlocking);
        shared.stop_blocking();
        assert_eq!(shared.state(), ServerLifecycleState::Stopped);
    }

    #[test]
    fn test_hook_outliving_server_is_noop() {
        let shared = listening_shared();
        let hook = StopHook::for_server(Arc::downgrade(&shared));
        drop(shared);
        hook.request_stop();
    }

    #[test]
    fn test_late_hook_after_blocking_stop_is_ignored() {
        let shared = listening_shared();
        let hook = StopHook::for_server(Arc::downgrade(&shared));
        let started = Instant::now();
        shared.stop_blocking();
        assert!(started.elapsed() < Duration::from_secs(1));
        hook.request_stop();
        assert_eq!(shared.state(), ServerLifecycleState::Stopped);
    }

    #[test]
    fn test_stop_before_init_is_noop() {
        let shared = Shared {
            state: AtomicU8::new(ServerLifecycleState::Uninitialized as u8),
            handle: Mutex::new(None),
            in_flight: Arc::new(InFlight::default()),
            drain_timeout: Duration::from_millis(10),
        };
        shared.stop_nonblocking();
        shared.stop_blocking();
        assert_eq!(shared.state(), ServerLifecycleState::Uninitialized);
    }
}
