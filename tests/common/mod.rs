#![allow(dead_code)]

pub mod test_server {
    use coordinator_ui::{
        ActiveToken, InMemoryCoordinator, LifecycleController, UiConfig, ViewRenderer,
    };
    use std::net::{SocketAddr, TcpListener};
    use std::sync::{Arc, Once};

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    /// Port nobody is listening on right now.
    pub fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    pub fn test_config() -> UiConfig {
        UiConfig {
            host: "127.0.0.1".to_string(),
            drain_timeout_ms: 2_000,
            ..UiConfig::default()
        }
    }

    /// A running UI over an in-memory coordinator, torn down on drop.
    pub struct TestUi {
        pub coordinator: Arc<InMemoryCoordinator>,
        pub controller: LifecycleController,
        pub addr: SocketAddr,
    }

    impl TestUi {
        pub fn start() -> Self {
            Self::start_with(InMemoryCoordinator::new())
        }

        pub fn start_with(coordinator: InMemoryCoordinator) -> Self {
            setup_may_runtime();
            let coordinator = Arc::new(coordinator);
            let controller = LifecycleController::new(
                coordinator.clone(),
                Arc::new(ViewRenderer::embedded().unwrap()),
                ActiveToken::new(),
                test_config(),
            );
            let port = free_port();
            controller.init(port).unwrap();
            controller.wait_ready().unwrap();
            Self {
                coordinator,
                controller,
                addr: SocketAddr::from(([127, 0, 0, 1], port)),
            }
        }
    }

    impl Drop for TestUi {
        fn drop(&mut self) {
            self.controller.teardown();
        }
    }
}

pub mod http {
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};
    use std::time::Duration;

    #[derive(Debug)]
    pub struct HttpReply {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl HttpReply {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    /// Send raw request bytes and read one response, framed by Content-Length.
    pub fn send_request(addr: &SocketAddr, raw: &str) -> HttpReply {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream.write_all(raw.as_bytes()).unwrap();

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos;
            }
            let n = stream.read(&mut chunk).unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let mut lines = head.split("\r\n");
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
            .unwrap();
        let headers: Vec<(String, String)> = lines
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        let length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);

        let mut body = buf[header_end + 4..].to_vec();
        while body.len() < length {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(length);
        HttpReply {
            status,
            headers,
            body,
        }
    }

    pub fn get(addr: &SocketAddr, target: &str) -> HttpReply {
        send_request(
            addr,
            &format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"),
        )
    }

    /// POST a form-encoded body.
    pub fn post_form(addr: &SocketAddr, target: &str, pairs: &[(&str, &str)]) -> HttpReply {
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        send_request(
            addr,
            &format!(
                "POST {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
                 Content-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            ),
        )
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}
