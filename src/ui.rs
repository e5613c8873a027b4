// Console layer: reads the folder name, shows transfer progress, and prints
// the status lines for each way a run can end.

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::OnceCell;
use std::io::{BufRead, IsTerminal};

use crate::drive::DriveFile;
use crate::photos::Album;
use crate::runner::RunOutcome;
use crate::transfer::{TransferObserver, TransferRecord, TransferStatus};

const PROMPT: &str = "Enter the google drive path name";

/// Read the source folder name. A terminal gets a `dialoguer` prompt, piped
/// input is read as one raw line. The result is trimmed and may be empty.
pub fn read_folder_name() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        let name: String = Input::new()
            .with_prompt(PROMPT)
            .allow_empty(true)
            .interact_text()?;
        Ok(name.trim().to_string())
    } else {
        println!("{}: ", PROMPT);
        read_name_from(stdin.lock())
    }
}

/// One line from `reader`, trimmed. End of input reads as an empty name.
pub fn read_name_from(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Progress bar over the transfer loop, created on the first file.
#[derive(Default)]
pub struct ConsoleReporter {
    bar: OnceCell<ProgressBar>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(&self) {
        if let Some(bar) = self.bar.get() {
            bar.finish_and_clear();
        }
    }
}

impl TransferObserver for ConsoleReporter {
    fn album_resolved(&self, album: &Album) {
        println!("{}", album_line(album));
    }

    fn file_started(&self, _index: usize, total: usize, file: &DriveFile) {
        let bar = self.bar.get_or_init(|| {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}") {
                bar.set_style(style);
            }
            bar
        });
        bar.set_message(file.name.clone());
    }

    fn file_finished(&self, record: &TransferRecord) {
        if let Some(bar) = self.bar.get() {
            if let TransferStatus::Failed { reason } = &record.status {
                bar.println(format!("{} {}: {}", "failed".red(), record.file.name, reason));
            }
            bar.inc(1);
        }
    }
}

fn album_line(album: &Album) -> String {
    format!("album '{}' id is '{}'", album.title, album.id)
}

/// The plain status lines for an outcome, first line being the headline.
pub fn describe_outcome(outcome: &RunOutcome) -> Vec<String> {
    match outcome {
        RunOutcome::FolderNotFound => vec!["No folder found.".to_string()],
        RunOutcome::AmbiguousFolder { matches } => {
            vec![format!("More than one folder found. {}", matches)]
        }
        RunOutcome::NoMedia => vec!["No files found.".to_string()],
        RunOutcome::Completed { summary, .. } => {
            let failed: Vec<&TransferRecord> = summary.failed().collect();
            let mut lines = vec![format!(
                "Uploaded {}, failed {}",
                summary.uploaded(),
                failed.len()
            )];
            lines.extend(
                failed
                    .iter()
                    .map(|r| format!("  {} -> {}", r.file.name, r.path.display())),
            );
            lines
        }
    }
}

pub fn report_outcome(outcome: &RunOutcome) {
    let lines = describe_outcome(outcome);
    let clean = matches!(
        outcome,
        RunOutcome::Completed { summary, .. } if summary.failed().next().is_none()
    );
    for (i, line) in lines.iter().enumerate() {
        if i == 0 && clean {
            println!("{}", line.as_str().green());
        } else if i == 0 {
            println!("{}", line.as_str().yellow());
        } else {
            println!("{}", line);
        }
    }
}
