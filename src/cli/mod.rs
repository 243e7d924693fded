//! # CLI Module
//!
//! Command-line front end of the `coordinator-ui` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the HTTP UI over an in-process coordinator seeded from a state file
//! (YAML or JSON) or, without one, a small demo cluster. The process exits
//! when the coordinator shuts down: through `/shutdown/`, SIGINT or SIGTERM.
//!
//! ```bash
//! coordinator-ui serve --port 8080 --state cluster.yaml
//! ```
//!
//! ### `render`
//!
//! Print one page or payload to stdout without starting a server:
//!
//! ```bash
//! coordinator-ui render jobs --state cluster.yaml
//! coordinator-ui render job --id 5f0c...
//! ```
//!
//! Configuration is layered: defaults, `--config` TOML file, `COORD_UI_*`
//! environment, then flags.

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{load_seed, render_page, run, run_cli, Cli, Commands, Page, Seed};
