//! Endpoint handlers.
//!
//! Each handler reads what it needs from the coordinator, builds a page or a
//! payload and returns exactly one completed [`Reply`]. Method and parameter
//! checks happen in the router before a handler runs, so inside a handler a
//! required parameter is always present.

use crate::coordinator::{Coordinator, JobDescriptor};
use crate::export::StateExporter;
use crate::ids::{DataObjectId, JobId, ResourceId, TaskId};
use crate::lifecycle::{ActiveToken, StopHook};
use crate::router::{RequestRouter, RouteRule};
use crate::server::{ContentType, Reply, ResponseSession, UiRequest};
use crate::view::{pages, template, Overview, ViewDictionary, ViewRenderer};
use http::{Method, StatusCode};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything a handler can reach.
pub struct UiState {
    pub coordinator: Arc<dyn Coordinator>,
    pub renderer: Arc<ViewRenderer>,
    pub token: ActiveToken,
    pub stop: StopHook,
}

pub const SHUTDOWN_ACK: &str = "Shutdown for coordinator initiated.";
pub const INJECT_ACK: &str = "ok";

/// Router with every endpoint registered.
pub fn build_router() -> RequestRouter<UiState> {
    let mut router = RequestRouter::new();
    router
        .register("/", RouteRule::get(), handle_root)
        .register("/favicon.ico", RouteRule::get(), handle_favicon)
        .register("/jobs/", RouteRule::get(), handle_jobs_list)
        .register("/job/submit/", RouteRule::post().require("test"), handle_job_submit)
        .register("/job/status/", RouteRule::get().require("id"), handle_job_status)
        .register("/job/dtg-view/", RouteRule::get().require("id"), handle_job_dtg_view)
        .register("/job/dtg/", RouteRule::get().require("id"), handle_job_dtg)
        .register("/resources/", RouteRule::get(), handle_resources_list)
        .register("/resources/topology/", RouteRule::get(), handle_resources_topology)
        .register("/resource/", RouteRule::get().require("id"), handle_resource)
        .register("/inject/", RouteRule::post(), handle_inject)
        .register("/ref/", RouteRule::get().require("id"), handle_reference)
        .register("/task/", RouteRule::get().require("id"), handle_task)
        .register(
            "/shutdown/",
            RouteRule::methods(&[Method::GET, Method::POST]),
            handle_shutdown,
        );
    router
}

fn render(state: &UiState, req: &UiRequest, doc: &ViewDictionary, template_id: &str) -> Reply {
    let mut session = ResponseSession::open(req.connection());
    match state.renderer.expand(doc, template_id) {
        Ok(body) => {
            session.set_content_type(ContentType::Html);
            session.write(&body);
            session.finalize()
        }
        Err(e) => {
            error!(
                request_id = %req.connection().request_id(),
                template = %template_id,
                error = %e,
                "Page render failed"
            );
            session.fail(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn payload(req: &UiRequest, bytes: crate::error::Result<Vec<u8>>) -> Reply {
    let mut session = ResponseSession::open(req.connection());
    match bytes {
        Ok(body) => {
            session.set_content_type(ContentType::Json);
            session.write(&body);
            session.finalize()
        }
        Err(e) => {
            error!(
                request_id = %req.connection().request_id(),
                error = %e,
                "Payload export failed"
            );
            session.fail(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn text(req: &UiRequest, body: &str) -> Reply {
    let mut session = ResponseSession::open(req.connection());
    session.set_content_type(ContentType::Text);
    session.write_str(body);
    session.finalize()
}

/// Required parameter parsed as `T`; `None` if it does not parse, which the
/// caller treats like an unknown id.
fn id_param<T: FromStr>(req: &UiRequest) -> Option<T> {
    req.param("id").and_then(|raw| raw.parse().ok())
}

fn handle_root(state: &UiState, req: &UiRequest) -> Reply {
    let doc = pages::overview(&Overview::collect(state.coordinator.as_ref()));
    render(state, req, &doc, template::MAIN)
}

fn handle_favicon(_: &UiState, req: &UiRequest) -> Reply {
    ResponseSession::open_error(req.connection(), StatusCode::NOT_FOUND).finalize()
}

fn handle_jobs_list(state: &UiState, req: &UiRequest) -> Reply {
    let jobs = state.coordinator.active_jobs();
    let doc = pages::job_list(state.coordinator.uuid(), &jobs);
    render(state, req, &doc, template::JOBS_LIST)
}

fn handle_job_submit(state: &UiState, req: &UiRequest) -> Reply {
    let raw = req.param("test").unwrap_or_default();
    let job: JobDescriptor = match serde_json::from_str(raw) {
        Ok(job) => job,
        Err(e) => {
            warn!(
                request_id = %req.connection().request_id(),
                error = %e,
                "Rejecting unparseable job submission"
            );
            return ResponseSession::open_error(req.connection(), StatusCode::INTERNAL_SERVER_ERROR)
                .finalize();
        }
    };
    let job_id = state.coordinator.submit_job(job);
    info!(
        request_id = %req.connection().request_id(),
        job_id = %job_id,
        "Job submitted"
    );
    text(req, &job_id.to_string())
}

fn handle_job_status(state: &UiState, req: &UiRequest) -> Reply {
    let job = id_param::<JobId>(req).and_then(|id| state.coordinator.job(&id));
    let doc = pages::job_status(state.coordinator.uuid(), job.as_ref());
    render(state, req, &doc, template::JOB_STATUS)
}

fn handle_job_dtg_view(state: &UiState, req: &UiRequest) -> Reply {
    let doc = pages::job_dtg_view(state.coordinator.uuid(), req.param("id").unwrap_or_default());
    render(state, req, &doc, template::JOB_DTG)
}

fn handle_job_dtg(state: &UiState, req: &UiRequest) -> Reply {
    let Some(job) = id_param::<JobId>(req).and_then(|id| state.coordinator.job(&id)) else {
        info!(
            request_id = %req.connection().request_id(),
            job_id = req.param("id").unwrap_or_default(),
            "Requested task graph for unknown job"
        );
        return ResponseSession::open_error(req.connection(), StatusCode::NOT_FOUND).finalize();
    };
    payload(req, StateExporter::task_graph(&job))
}

fn handle_resources_list(state: &UiState, req: &UiRequest) -> Reply {
    let resources = state.coordinator.associated_resources();
    let doc = pages::resource_list(state.coordinator.uuid(), &resources);
    render(state, req, &doc, template::RESOURCES_LIST)
}

fn handle_resources_topology(state: &UiState, req: &UiRequest) -> Reply {
    let topology = state.coordinator.local_resource_topology();
    payload(req, StateExporter::topology(&topology))
}

fn handle_resource(state: &UiState, req: &UiRequest) -> Reply {
    let res = id_param::<ResourceId>(req).and_then(|id| state.coordinator.resource(&id));
    let doc = pages::resource_status(state.coordinator.uuid(), res.as_ref());
    render(state, req, &doc, template::RESOURCE_STATUS)
}

fn handle_inject(_: &UiState, req: &UiRequest) -> Reply {
    text(req, INJECT_ACK)
}

fn handle_reference(state: &UiState, req: &UiRequest) -> Reply {
    let reference = id_param::<DataObjectId>(req).and_then(|id| state.coordinator.reference(id));
    let doc = pages::reference_view(state.coordinator.uuid(), reference.as_ref());
    render(state, req, &doc, template::REFERENCE_VIEW)
}

fn handle_task(state: &UiState, req: &UiRequest) -> Reply {
    let task = id_param::<TaskId>(req).and_then(|id| state.coordinator.task(id));
    let doc = pages::task_status(state.coordinator.uuid(), task.as_ref());
    render(state, req, &doc, template::TASK_STATUS)
}

/// Runs inside the server it stops: flip the token and tell the coordinator.
/// The non-blocking stop rides on the reply and runs once the
/// acknowledgement has been handed to the transport.
fn handle_shutdown(state: &UiState, req: &UiRequest) -> Reply {
    let won = state.token.deactivate();
    if won {
        let reason = format!("HTTP request from {}", req.peer());
        info!(request_id = %req.connection().request_id(), reason = %reason, "Shutdown requested");
        state.coordinator.shutdown(&reason);
    } else {
        info!(
            request_id = %req.connection().request_id(),
            "Shutdown already in progress"
        );
    }
    let reply = text(req, SHUTDOWN_ACK);
    if won {
        let stop = state.stop.clone();
        reply.after_send(move || stop.request_stop())
    } else {
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{InMemoryCoordinator, TaskDescriptor};
    use crate::server::{Connection, SessionLedger};

    struct Fixture {
        coordinator: Arc<InMemoryCoordinator>,
        state: UiState,
        router: RequestRouter<UiState>,
        ledger: Arc<SessionLedger>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_stop(StopHook::detached())
        }

        fn with_stop(stop: StopHook) -> Self {
            let coordinator = Arc::new(InMemoryCoordinator::new());
            let state = UiState {
                coordinator: coordinator.clone(),
                renderer: Arc::new(ViewRenderer::embedded().unwrap()),
                token: ActiveToken::new(),
                stop,
            };
            Self {
                coordinator,
                state,
                router: build_router(),
                ledger: Arc::new(SessionLedger::default()),
            }
        }

        fn request(&self, method: Method, target: &str) -> UiRequest {
            UiRequest::new(method, target, Connection::new(self.ledger.clone()))
        }

        fn send(&self, req: UiRequest) -> Reply {
            self.router.dispatch(&self.state, &req).unwrap()
        }

        fn get(&self, target: &str) -> Reply {
            self.send(self.request(Method::GET, target))
        }
    }

    fn body(reply: &Reply) -> String {
        String::from_utf8(reply.body().to_vec()).unwrap()
    }

    #[test]
    fn test_all_endpoints_registered() {
        assert_eq!(
            build_router().patterns(),
            vec![
                "/",
                "/favicon.ico",
                "/inject/",
                "/job/dtg-view/",
                "/job/dtg/",
                "/job/status/",
                "/job/submit/",
                "/jobs/",
                "/ref/",
                "/resource/",
                "/resources/",
                "/resources/topology/",
                "/shutdown/",
                "/task/",
            ]
        );
    }

    #[test]
    fn test_submit_then_status() {
        let f = Fixture::new();
        let job = serde_json::to_string(&JobDescriptor {
            name: "pi".into(),
            root_task: TaskDescriptor::default(),
            ..Default::default()
        })
        .unwrap();
        let encoded: String = url::form_urlencoded::byte_serialize(job.as_bytes()).collect();
        let req = f
            .request(Method::POST, "/job/submit/")
            .with_form_body(&format!("test={encoded}"));
        let reply = f.send(req);
        assert_eq!(reply.status(), StatusCode::OK);
        let id = body(&reply);
        assert!(id.parse::<JobId>().is_ok());
        assert_eq!(f.coordinator.submissions(), 1);

        let page = f.get(&format!("/job/status/?id={id}"));
        assert_eq!(page.status(), StatusCode::OK);
        let html = body(&page);
        assert!(!html.contains("class=\"error-panel\""));
        assert!(html.contains(&id));
    }

    #[test]
    fn test_unparseable_submission_is_500_without_submit() {
        let f = Fixture::new();
        let reply = f.send(f.request(Method::POST, "/job/submit/?test=not-json"));
        assert_eq!(reply.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(reply.body().is_empty());
        assert_eq!(f.coordinator.submissions(), 0);
    }

    #[test]
    fn test_unknown_ids_render_error_panel() {
        let f = Fixture::new();
        for target in [
            "/job/status/?id=00000000-0000-0000-0000-00000000beef",
            "/job/status/?id=garbage",
            "/resource/?id=garbage",
            "/ref/?id=424242",
            "/task/?id=424242",
        ] {
            let reply = f.get(target);
            assert_eq!(reply.status(), StatusCode::OK, "{target}");
            assert!(body(&reply).contains("class=\"error-panel\""), "{target}");
        }
    }

    #[test]
    fn test_unknown_job_dtg_is_404() {
        let f = Fixture::new();
        let reply = f.get(&format!("/job/dtg/?id={}", JobId::generate()));
        assert_eq!(reply.status(), StatusCode::NOT_FOUND);
        assert!(reply.body().is_empty());
    }

    #[test]
    fn test_dtg_view_echoes_id() {
        let f = Fixture::new();
        let reply = f.get("/job/dtg-view/?id=whatever-123");
        assert_eq!(reply.status(), StatusCode::OK);
        assert!(body(&reply).contains("whatever-123"));
    }

    #[test]
    fn test_inject_ack() {
        let f = Fixture::new();
        let reply = f.send(f.request(Method::POST, "/inject/"));
        assert_eq!(body(&reply), INJECT_ACK);
        let wrong = f.get("/inject/");
        assert_eq!(wrong.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_shutdown_forwards_reason_once() {
        let f = Fixture::new();
        let req = f
            .request(Method::POST, "/shutdown/")
            .with_header("X-Forwarded-For", "10.1.2.3, 10.0.0.1");
        let reply = f.send(req);
        assert_eq!(body(&reply), SHUTDOWN_ACK);
        assert!(!f.state.token.is_active());
        assert_eq!(
            f.coordinator.shutdown_reason().as_deref(),
            Some("HTTP request from 10.1.2.3")
        );

        let again = f.get("/shutdown/");
        assert_eq!(body(&again), SHUTDOWN_ACK);
        assert_eq!(
            f.coordinator.shutdown_reason().as_deref(),
            Some("HTTP request from 10.1.2.3")
        );
    }

    #[test]
    fn test_shutdown_stop_runs_after_reply_is_built() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let stops = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stops);
        let f = Fixture::with_stop(StopHook::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let mut reply = f.get("/shutdown/");
        assert_eq!(body(&reply), SHUTDOWN_ACK);
        assert!(f.coordinator.shutdown_reason().is_some());
        // Handler returned with the acknowledgement; the server is still up.
        assert_eq!(stops.load(Ordering::SeqCst), 0);

        let stop = reply.take_after_send().expect("stop attached to the reply");
        stop();
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        // A losing request acknowledges without a second stop.
        let mut again = f.get("/shutdown/");
        assert_eq!(body(&again), SHUTDOWN_ACK);
        assert!(again.take_after_send().is_none());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_every_reply_completes_its_session() {
        let f = Fixture::new();
        for target in ["/", "/jobs/", "/resources/", "/resources/topology/", "/favicon.ico"] {
            let _ = f.get(target);
        }
        let _ = f.get("/job/status/");
        assert_eq!(f.ledger.opened(), 6);
        assert_eq!(f.ledger.completed(), 6);
        assert_eq!(f.ledger.leaked(), 0);
    }
}
