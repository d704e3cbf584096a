//! Wait flags and spinner output for workflows that poll remote jobs

use std::time::Duration;

use clap::Args;
use drainctl_core::client::JobState;
use drainctl_core::{ProgressCallback, ProgressEvent, WaitConfig};
use indicatif::{ProgressBar, ProgressStyle};

/// Common CLI arguments for operations that wait on remote jobs
#[derive(Args, Debug, Clone)]
pub struct AsyncOperationArgs {
    /// Maximum time to wait for each remote job, in seconds
    #[arg(long, default_value = "300", value_parser = clap::value_parser!(u64).range(1..))]
    pub wait_timeout: u64,

    /// Polling interval in seconds
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u64).range(1..))]
    pub wait_interval: u64,
}

impl AsyncOperationArgs {
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig::new(
            Duration::from_secs(self.wait_timeout),
            Duration::from_secs(self.wait_interval),
        )
    }
}

/// Spinner shown on stderr while jobs are polled
///
/// Hidden when stderr is not a terminal, so scripted output stays clean.
pub struct JobSpinner {
    bar: ProgressBar,
}

impl JobSpinner {
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed_precise}]")
        {
            bar.set_style(style);
        }
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Progress callback that keeps the spinner message current
    pub fn callback(&self, label: &str) -> ProgressCallback {
        let bar = self.bar.clone();
        let label = label.to_string();
        Box::new(move |event: ProgressEvent| match &event {
            ProgressEvent::Started { job } => {
                bar.set_message(format!("{}: job {} started", label, job));
            }
            ProgressEvent::Polling { job, state, .. } => {
                bar.set_message(format!("{}: job {} {}", label, job, format_job_state(*state)));
            }
            ProgressEvent::Completed { job } => {
                bar.set_message(format!(
                    "{}: job {} {}",
                    label,
                    job,
                    format_job_state(JobState::Complete)
                ));
            }
            ProgressEvent::Failed { job, error } => {
                bar.set_message(format!("{}: job {} failed: {}", label, job, error));
            }
        })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for JobSpinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

/// Format job state for display with status icons
fn format_job_state(state: JobState) -> String {
    match state {
        JobState::Complete => format!("\u{2713} {}", state), // checkmark
        JobState::Failed => format!("\u{2717} {}", state),   // x mark
        JobState::Processing => format!("\u{21bb} {}", state), // arrow circle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_config_from_args() {
        let args = AsyncOperationArgs {
            wait_timeout: 60,
            wait_interval: 5,
        };
        assert_eq!(
            args.wait_config(),
            WaitConfig::new(Duration::from_secs(60), Duration::from_secs(5))
        );
    }

    #[test]
    fn test_format_job_state() {
        assert_eq!(format_job_state(JobState::Complete), "\u{2713} complete");
        assert_eq!(format_job_state(JobState::Processing), "\u{21bb} processing");
    }
}
