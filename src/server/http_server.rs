use crate::error::{Result, UiError};
use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Wrapper around may_minihttp's HTTP server.
///
/// Uses 32 max headers so requests relayed through proxies still parse.
pub struct HttpServer<T>(pub T);

/// Handle to the listener coroutine of a running server.
///
/// Stopping is split in two halves: [`ServerHandle::cancel`] stops accepting
/// and returns immediately, [`ServerHandle::join`] waits for the listener
/// coroutine to unwind. Connection coroutines already spawned by the
/// listener are independent of it and finish the request they are serving.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Poll the listening address until a TCP connection succeeds.
    ///
    /// # Errors
    ///
    /// `TimedOut` if the server is not reachable within ~250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        Self::wait_ready_at(self.addr)
    }

    /// [`ServerHandle::wait_ready`] for an address without a handle.
    pub fn wait_ready_at(addr: SocketAddr) -> io::Result<()> {
        let probe = if addr.ip().is_unspecified() {
            SocketAddr::from(([127, 0, 0, 1], addr.port()))
        } else {
            addr
        };
        for _ in 0..50 {
            if TcpStream::connect(probe).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting connections without waiting for anything.
    pub fn cancel(&self) {
        // SAFETY: may marks coroutine cancellation unsafe. The handle is valid
        // for as long as we hold it, and unwinding the accept loop is the
        // intended way to stop a may_minihttp listener.
        unsafe {
            self.handle.coroutine().cancel();
        }
    }

    /// Wait for the listener coroutine to finish.
    ///
    /// A cancelled listener unwinds, which `may` reports as a panic; that is
    /// the expected outcome of [`ServerHandle::cancel`] and is not an error.
    pub fn join(self) {
        let _ = self.handle.join();
    }

    /// Cancel and join.
    pub fn stop(self) {
        self.cancel();
        self.join();
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind `addr` and start serving on a new listener coroutine.
    ///
    /// # Errors
    ///
    /// [`UiError::Startup`] if the address does not resolve or the socket
    /// cannot be bound.
    pub fn start<A: ToSocketAddrs + std::fmt::Debug>(self, addr: A) -> Result<ServerHandle> {
        let label = format!("{addr:?}");
        let addr = addr
            .to_socket_addrs()
            .map_err(|e| UiError::startup(label.clone(), e))?
            .next()
            .ok_or_else(|| {
                UiError::startup(
                    label,
                    io::Error::new(io::ErrorKind::InvalidInput, "address did not resolve"),
                )
            })?;
        let handle = HttpServerWithHeaders::<_, 32>(self.0)
            .start(addr)
            .map_err(|e| UiError::startup_at(addr, e))?;
        Ok(ServerHandle { addr, handle })
    }
}
