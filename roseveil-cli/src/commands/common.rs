//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::sync::Mutex;

use console::style;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};

use roseveil::manager::{
    BoxFuture, DownloadProgress, EventSink, ExecutableSelector, ExecutableValidator,
    ManagerError, ManagerResult, PipelineEvent,
};

use crate::error::CliError;

/// Renders pipeline events: phase lines plus a download progress bar.
#[derive(Default)]
pub struct ConsoleSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn update_bar(&self, progress: &DownloadProgress) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(|| new_bar(progress.total));
        if progress.total > 0 && bar.length() != Some(progress.total) {
            bar.set_length(progress.total);
        }
        bar.set_position(progress.downloaded);
    }

    fn clear_bar(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Status { phase, message } => {
                self.clear_bar();
                println!("{} {}", style(format!("[{}]", phase)).dim(), message);
            }
            PipelineEvent::Progress(progress) => self.update_bar(progress),
            PipelineEvent::Done { ok, message, error } => {
                self.clear_bar();
                print_outcome(*ok, message.as_deref().or(error.as_deref()).unwrap_or(""));
            }
            PipelineEvent::VerifyDone {
                ok,
                repaired,
                issues,
                error,
            } => {
                self.clear_bar();
                let summary = match (error, issues) {
                    (Some(error), _) => error.clone(),
                    (None, _) if *repaired => "Install repaired".to_string(),
                    (None, Some(0)) | (None, None) => "All files verified".to_string(),
                    (None, Some(n)) => format!("{} file(s) still failing verification", n),
                };
                print_outcome(*ok, &summary);
            }
        }
    }
}

fn new_bar(total: u64) -> ProgressBar {
    if total == 0 {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        return bar;
    }

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "[{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn print_outcome(ok: bool, text: &str) {
    if ok {
        println!("{} {}", style("✓").green(), text);
    } else {
        eprintln!("{} {}", style("✗").red(), text);
    }
}

/// Asks on the terminal for the game executable until the validator accepts one.
pub struct PromptSelector;

impl ExecutableSelector for PromptSelector {
    fn select<'a>(
        &'a self,
        validator: &'a ExecutableValidator,
    ) -> BoxFuture<'a, ManagerResult<PathBuf>> {
        let validator = validator.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || prompt_for_executable(&validator))
                .await
                .map_err(|e| ManagerError::ExecutableNotConfigured(e.to_string()))?
        })
    }
}

fn prompt_for_executable(validator: &ExecutableValidator) -> ManagerResult<PathBuf> {
    println!(
        "The game executable ({}) is not configured.",
        validator.exe_name()
    );
    loop {
        let answer: String = Input::new()
            .with_prompt(format!("Path to {} (empty to cancel)", validator.exe_name()))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| ManagerError::ExecutableNotConfigured(e.to_string()))?;

        let answer = answer.trim().trim_matches('"');
        if answer.is_empty() {
            return Err(ManagerError::ExecutableNotConfigured(
                "no executable selected".to_string(),
            ));
        }

        let path = PathBuf::from(answer);
        match validator.validate(&path) {
            Ok(()) => return Ok(path),
            Err(e) => eprintln!("{} {}", style("✗").red(), e),
        }
    }
}

/// Yes/no question; `assume_yes` skips the prompt.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool, CliError> {
    if assume_yes {
        return Ok(true);
    }
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))
}

/// Print `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Config(format!("Failed to encode output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
