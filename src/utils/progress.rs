use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Spinner shown while a pipeline stage runs. A silent reporter prints nothing,
/// which keeps machine-readable output (`--json`) clean.
pub struct ProgressReporter {
    progress_bar: Option<ProgressBar>,
    started: Instant,
}

impl ProgressReporter {
    pub fn spinner(message: &str, silent: bool) -> Self {
        if silent {
            return Self::silent();
        }

        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            progress_bar: Some(pb),
            started: Instant::now(),
        }
    }

    pub fn silent() -> Self {
        Self {
            progress_bar: None,
            started: Instant::now(),
        }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Stop the spinner, leaving `message` and the stage duration on screen
    pub fn finish(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(format!(
                "{} ({:.1}s)",
                message,
                self.started.elapsed().as_secs_f64()
            ));
        }
    }

    /// Print above the spinner without garbling it
    pub fn println(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.println(message);
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ref pb) = self.progress_bar {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}
