fn main() -> anyhow::Result<()> {
    coordinator_ui::cli::run_cli()
}
