use crate::config::UiConfig;
use crate::coordinator::{
    Coordinator, InMemoryCoordinator, JobDescriptor, JobState, ReferenceDescriptor,
    ResourceDescriptor, ResourceState, ResourceTopologyNodeDescriptor, ResourceType, TaskDescriptor,
    TaskState,
};
use crate::export::StateExporter;
use crate::ids::{DataObjectId, JobId, ResourceId, TaskId};
use crate::lifecycle::{ActiveToken, LifecycleController};
use crate::otel::{init_logging_with_config, LogConfig};
use crate::view::{pages, template, Overview, ViewRenderer};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line interface for the coordinator HTTP UI
#[derive(Debug, Parser)]
#[command(name = "coordinator-ui", version)]
#[command(about = "Coordinator introspection and control HTTP UI", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "COORD_UI_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP UI until the coordinator shuts down
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory of `<id>.html` templates overriding the embedded ones
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Coordinator state to load (YAML or JSON); a demo cluster if absent
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Render one page or payload to stdout
    Render {
        #[arg(value_enum)]
        page: Page,

        /// Entity id, for pages that show one entity
        #[arg(long)]
        id: Option<String>,

        /// Coordinator state to load (YAML or JSON); a demo cluster if absent
        #[arg(long)]
        state: Option<PathBuf>,

        /// Directory of `<id>.html` templates overriding the embedded ones
        #[arg(long)]
        templates: Option<PathBuf>,
    },
}

/// What `render` can produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Page {
    Overview,
    Jobs,
    Job,
    DtgView,
    Dtg,
    Resources,
    Resource,
    Topology,
    Reference,
    Task,
}

/// Initial coordinator contents.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Seed {
    pub coordinator_id: Option<ResourceId>,
    /// Resource trees attached under the coordinator.
    pub resources: Vec<ResourceTopologyNodeDescriptor>,
    pub jobs: Vec<JobDescriptor>,
}

impl Seed {
    pub fn into_coordinator(self) -> InMemoryCoordinator {
        let coordinator = match self.coordinator_id {
            Some(id) => InMemoryCoordinator::with_uuid(id),
            None => InMemoryCoordinator::new(),
        };
        for tree in self.resources {
            coordinator.add_resource_tree(tree);
        }
        for job in self.jobs {
            coordinator.insert_job(job);
        }
        coordinator
    }

    /// One machine with two processing units and a small running job.
    pub fn demo() -> Self {
        let pu = |name: &str| ResourceTopologyNodeDescriptor {
            resource_desc: ResourceDescriptor {
                uuid: ResourceId::generate(),
                friendly_name: name.to_string(),
                state: ResourceState::Idle,
                resource_type: ResourceType::Pu,
                ..Default::default()
            },
            ..Default::default()
        };
        let machine = ResourceTopologyNodeDescriptor {
            resource_desc: ResourceDescriptor {
                uuid: ResourceId::generate(),
                friendly_name: "machine0".to_string(),
                state: ResourceState::Busy,
                resource_type: ResourceType::Machine,
                ..Default::default()
            },
            children: vec![pu("machine0/pu0"), pu("machine0/pu1")],
            ..Default::default()
        };
        let job = JobDescriptor {
            uuid: JobId::generate(),
            name: "demo".to_string(),
            state: JobState::Running,
            root_task: TaskDescriptor {
                uid: TaskId(1),
                name: "root".to_string(),
                state: TaskState::Running,
                spawned: vec![TaskDescriptor {
                    uid: TaskId(2),
                    name: "child".to_string(),
                    state: TaskState::Runnable,
                    ..Default::default()
                }],
                outputs: vec![ReferenceDescriptor {
                    id: DataObjectId(1),
                    ..Default::default()
                }],
                ..Default::default()
            },
            output_ids: vec![DataObjectId(1)],
        };
        Seed {
            coordinator_id: None,
            resources: vec![machine],
            jobs: vec![job],
        }
    }
}

/// Read a [`Seed`]; `.json` files are JSON, anything else YAML.
pub fn load_seed(path: &Path) -> Result<Seed> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    let seed = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid YAML in {}", path.display()))?
    };
    Ok(seed)
}

fn coordinator_from(state: Option<&Path>) -> Result<InMemoryCoordinator> {
    let seed = match state {
        Some(path) => load_seed(path)?,
        None => Seed::demo(),
    };
    Ok(seed.into_coordinator())
}

fn required_id<'a>(page: Page, id: Option<&'a str>) -> Result<&'a str> {
    id.ok_or_else(|| anyhow!("page `{page:?}` needs --id"))
}

/// Produce the bytes `page` would be served with.
pub fn render_page(
    coordinator: &dyn Coordinator,
    renderer: &ViewRenderer,
    page: Page,
    id: Option<&str>,
) -> Result<Vec<u8>> {
    let me = coordinator.uuid();
    let (doc, template_id) = match page {
        Page::Overview => (pages::overview(&Overview::collect(coordinator)), template::MAIN),
        Page::Jobs => (pages::job_list(me, &coordinator.active_jobs()), template::JOBS_LIST),
        Page::Job => {
            let job = required_id(page, id)?
                .parse::<JobId>()
                .ok()
                .and_then(|id| coordinator.job(&id));
            (pages::job_status(me, job.as_ref()), template::JOB_STATUS)
        }
        Page::DtgView => (pages::job_dtg_view(me, required_id(page, id)?), template::JOB_DTG),
        Page::Dtg => {
            let raw = required_id(page, id)?;
            let job = raw
                .parse::<JobId>()
                .ok()
                .and_then(|id| coordinator.job(&id))
                .ok_or_else(|| anyhow!("no job {raw}"))?;
            return Ok(StateExporter::task_graph(&job)?);
        }
        Page::Resources => (
            pages::resource_list(me, &coordinator.associated_resources()),
            template::RESOURCES_LIST,
        ),
        Page::Resource => {
            let res = required_id(page, id)?
                .parse::<ResourceId>()
                .ok()
                .and_then(|id| coordinator.resource(&id));
            (pages::resource_status(me, res.as_ref()), template::RESOURCE_STATUS)
        }
        Page::Topology => return Ok(StateExporter::topology(&coordinator.local_resource_topology())?),
        Page::Reference => {
            let reference = required_id(page, id)?
                .parse::<DataObjectId>()
                .ok()
                .and_then(|id| coordinator.reference(id));
            (pages::reference_view(me, reference.as_ref()), template::REFERENCE_VIEW)
        }
        Page::Task => {
            let task = required_id(page, id)?
                .parse::<TaskId>()
                .ok()
                .and_then(|id| coordinator.task(id));
            (pages::task_status(me, task.as_ref()), template::TASK_STATUS)
        }
    };
    Ok(renderer.expand(&doc, template_id)?)
}

fn layered_config(path: Option<&Path>) -> Result<UiConfig> {
    let mut config = match path {
        Some(path) => UiConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => UiConfig::default(),
    };
    config.apply_env().context("Invalid COORD_UI_* environment")?;
    Ok(config)
}

#[cfg(unix)]
fn forward_signals(coordinator: Arc<InMemoryCoordinator>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                coordinator.shutdown(&format!("signal {signal}"));
            }
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

#[cfg(not(unix))]
fn forward_signals(_: Arc<InMemoryCoordinator>) -> Result<()> {
    Ok(())
}

fn serve(config: UiConfig, state: Option<&Path>) -> Result<()> {
    let _log_guard = init_logging_with_config(&LogConfig::from_env())?;
    may::config().set_stack_size(config.stack_size);

    let coordinator = Arc::new(coordinator_from(state)?);
    let renderer = Arc::new(
        ViewRenderer::new(config.template_dir.as_deref()).context("Failed to load templates")?,
    );
    let controller = LifecycleController::new(
        Arc::clone(&coordinator) as Arc<dyn Coordinator>,
        renderer,
        ActiveToken::new(),
        config.clone(),
    );
    controller
        .init(config.port)
        .context("Coordinator HTTP UI unavailable")?;
    forward_signals(Arc::clone(&coordinator))?;

    let reason = loop {
        if let Some(reason) = coordinator.wait_for_shutdown(Duration::from_millis(500)) {
            break reason;
        }
    };
    info!(reason = %reason, "Coordinator shutting down");
    controller.teardown();
    Ok(())
}

/// Execute a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config = layered_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Serve {
            host,
            port,
            templates,
            state,
        } => {
            let mut config = config;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if templates.is_some() {
                config.template_dir = templates;
            }
            serve(config, state.as_deref())
        }
        Commands::Render {
            page,
            id,
            state,
            templates,
        } => {
            let coordinator = coordinator_from(state.as_deref())?;
            let dir = templates.or(config.template_dir);
            let renderer = ViewRenderer::new(dir.as_deref())?;
            let bytes = render_page(&coordinator, &renderer, page, id.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.write_all(b"\n")?;
            Ok(())
        }
    }
}

/// Parse `std::env::args` and run.
pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}
