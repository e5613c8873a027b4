// Entrypoint for the CLI.
// - Reads the folder name; blank input ends the run without doing anything.
// - Everything else lives in the library so it can be exercised in tests.

use drive2photo_cli::config::{self, Config};
use drive2photo_cli::{logging, runner, ui};

fn main() -> anyhow::Result<()> {
    logging::init(&config::log_level_from_env());
    let config = Config::from_env();

    let folder_name = ui::read_folder_name()?;
    if folder_name.is_empty() {
        return Ok(());
    }

    let (drive, photos) = runner::connect(&config)?;

    let reporter = ui::ConsoleReporter::new();
    let outcome = runner::run(
        &drive,
        &photos,
        &config.staging_root,
        &folder_name,
        &reporter,
    );
    reporter.finish();

    ui::report_outcome(&outcome?);
    Ok(())
}
