//! # coordinator-ui
//!
//! Introspection and control HTTP surface for a cluster scheduler's
//! coordinator. Operators browse jobs, tasks, resources and data references
//! as rendered pages; machine clients fetch the resource topology and job
//! task graphs as JSON. Two control operations, job submission and shutdown,
//! are forwarded to the coordinator unchanged.
//!
//! ## Architecture
//!
//! - **[`coordinator`]** - the collaborator contract and snapshot types, plus an in-memory implementation
//! - **[`server`]** - `may_minihttp` plumbing: request parsing, one-shot response sessions, the service
//! - **[`router`]** - exact-path routing with per-route method and parameter rules
//! - **[`view`]** - document building and template expansion for pages
//! - **[`export`]** - JSON payloads for machine clients
//! - **[`handlers`]** - one handler per endpoint
//! - **[`lifecycle`]** - start and the two stop paths, coordinated by an [`ActiveToken`]
//! - **[`config`]** / **[`otel`]** - configuration layering and structured logging
//! - **[`cli`]** - the `coordinator-ui` binary: `serve` and `render`
//!
//! ## Request flow
//!
//! ```text
//! accept ─▶ UiService::call ─▶ RequestRouter::dispatch ─▶ handler
//!                                   │                      │
//!                            rule check (500)     Coordinator snapshot
//!                                                          │
//!                                   ViewRenderer / StateExporter
//!                                                          │
//!                                      ResponseSession::finalize ─▶ Reply
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path | Params | Response |
//! |---|---|---|---|
//! | GET | `/` | | overview page |
//! | GET | `/favicon.ico` | | 404 |
//! | GET | `/jobs/` | | job list |
//! | POST | `/job/submit/` | `test` | job id as text |
//! | GET | `/job/status/` | `id` | job page |
//! | GET | `/job/dtg-view/` | `id` | task graph viewer |
//! | GET | `/job/dtg/` | `id` | task graph JSON, 404 if unknown |
//! | GET | `/resources/` | | resource list |
//! | GET | `/resources/topology/` | | topology JSON |
//! | GET | `/resource/` | `id` | resource page |
//! | POST | `/inject/` | | `ok` |
//! | GET | `/ref/` | `id` | reference page |
//! | GET | `/task/` | `id` | task page |
//! | GET, POST | `/shutdown/` | | acknowledgement, then teardown |
//!
//! A wrong method or missing parameter gets a bare 500. An id that resolves
//! to nothing gets a 200 page with an error panel, except on `/job/dtg/`
//! where it is a 404.
//!
//! ## Example
//!
//! ```rust,no_run
//! use coordinator_ui::{ActiveToken, InMemoryCoordinator, LifecycleController, UiConfig, ViewRenderer};
//! use std::sync::Arc;
//!
//! let coordinator = Arc::new(InMemoryCoordinator::new());
//! let controller = LifecycleController::new(
//!     coordinator.clone(),
//!     Arc::new(ViewRenderer::embedded()?),
//!     ActiveToken::new(),
//!     UiConfig::default(),
//! );
//! controller.init(8080)?;
//! coordinator.wait_for_shutdown(std::time::Duration::from_secs(60));
//! controller.teardown();
//! # Ok::<(), coordinator_ui::UiError>(())
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod handlers;
pub mod ids;
pub mod lifecycle;
pub mod otel;
pub mod router;
pub mod server;
pub mod view;

pub use config::UiConfig;
pub use coordinator::{Coordinator, InMemoryCoordinator};
pub use error::{Result, UiError};
pub use export::StateExporter;
pub use lifecycle::{ActiveToken, LifecycleController, ServerLifecycleState};
pub use router::{RequestRouter, RouteRule};
pub use server::{Reply, ResponseSession, SessionLedger, UiRequest};
pub use view::{ErrorAnnotation, ViewDictionary, ViewRenderer};
