//! Unit tests for CLI commands

use crate::cli::{load_seed, render_page, Cli, Commands, Page, Seed};
use crate::coordinator::{Coordinator, ResourceTopologyNodeDescriptor};
use crate::export::StateExporter;
use crate::view::ViewRenderer;
use clap::Parser;
use std::io::Write;

fn html(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_serve_command_parses_flags() {
    let cli = Cli::try_parse_from([
        "coordinator-ui",
        "serve",
        "--port",
        "9000",
        "--host",
        "127.0.0.1",
        "--state",
        "cluster.yaml",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            host, port, state, templates,
        } => {
            assert_eq!(host.as_deref(), Some("127.0.0.1"));
            assert_eq!(port, Some(9000));
            assert_eq!(state.unwrap().to_string_lossy(), "cluster.yaml");
            assert!(templates.is_none());
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_config_flag_is_global() {
    let cli = Cli::try_parse_from(["coordinator-ui", "render", "jobs", "--config", "ui.toml"]).unwrap();
    assert_eq!(cli.config.unwrap().to_string_lossy(), "ui.toml");
}

#[test]
fn test_render_command_parses_page_names() {
    let cli = Cli::try_parse_from(["coordinator-ui", "render", "dtg-view", "--id", "abc"]).unwrap();
    match cli.command {
        Commands::Render { page, id, .. } => {
            assert_eq!(page, Page::DtgView);
            assert_eq!(id.as_deref(), Some("abc"));
        }
        _ => panic!("Expected Render command"),
    }
}

#[test]
fn test_unknown_page_is_rejected() {
    assert!(Cli::try_parse_from(["coordinator-ui", "render", "metrics"]).is_err());
}

#[test]
fn test_render_overview_names_coordinator() {
    let coordinator = Seed::demo().into_coordinator();
    let renderer = ViewRenderer::embedded().unwrap();
    let page = html(render_page(&coordinator, &renderer, Page::Overview, None).unwrap());
    assert!(page.contains(&coordinator.uuid().to_string()));
}

#[test]
fn test_render_job_list_has_demo_job() {
    let coordinator = Seed::demo().into_coordinator();
    let renderer = ViewRenderer::embedded().unwrap();
    let page = html(render_page(&coordinator, &renderer, Page::Jobs, None).unwrap());
    assert_eq!(page.matches("class=\"job-row\"").count(), 1);
    assert!(page.contains("demo"));
}

#[test]
fn test_render_single_entity_page_needs_id() {
    let coordinator = Seed::demo().into_coordinator();
    let renderer = ViewRenderer::embedded().unwrap();
    let err = render_page(&coordinator, &renderer, Page::Job, None).unwrap_err();
    assert!(err.to_string().contains("--id"));
}

#[test]
fn test_render_unknown_job_shows_error_panel() {
    let coordinator = Seed::demo().into_coordinator();
    let renderer = ViewRenderer::embedded().unwrap();
    let page = html(render_page(&coordinator, &renderer, Page::Job, Some("not-a-uuid")).unwrap());
    assert!(page.contains("class=\"error-panel\""));
}

#[test]
fn test_render_dtg_for_unknown_job_fails() {
    let coordinator = Seed::demo().into_coordinator();
    let renderer = ViewRenderer::embedded().unwrap();
    assert!(render_page(&coordinator, &renderer, Page::Dtg, Some("not-a-uuid")).is_err());
}

#[test]
fn test_render_topology_round_trips() {
    let coordinator = Seed::demo().into_coordinator();
    let renderer = ViewRenderer::embedded().unwrap();
    let bytes = render_page(&coordinator, &renderer, Page::Topology, None).unwrap();
    let tree: ResourceTopologyNodeDescriptor = StateExporter::from_payload(&bytes).unwrap();
    assert_eq!(tree, coordinator.local_resource_topology());
    // coordinator, machine, two PUs
    assert_eq!(tree.node_count(), 4);
}

#[test]
fn test_load_seed_yaml_and_json() {
    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(yaml, "jobs:\n  - name: wordcount\n    state: RUNNING").unwrap();
    let seed = load_seed(yaml.path()).unwrap();
    assert_eq!(seed.jobs.len(), 1);
    assert_eq!(seed.jobs[0].name, "wordcount");

    let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(json, r#"{{"jobs": [], "resources": []}}"#).unwrap();
    let seed = load_seed(json.path()).unwrap();
    assert!(seed.jobs.is_empty());
    assert!(seed.coordinator_id.is_none());
}

#[test]
fn test_load_seed_rejects_unknown_fields() {
    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(yaml, "workers: 4").unwrap();
    assert!(load_seed(yaml.path()).is_err());
}
