//! Spinner progress for deployment runs

use declarative::{Outcome, Phase, ProgressCallback, ResourceId};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Spinner showing the resource currently being applied
pub struct SpinnerProgress {
    pb: ProgressBar,
    total: usize,
    done: usize,
}

impl SpinnerProgress {
    pub fn new(total: usize) -> Self {
        Self {
            pb: spinner("Starting deployment..."),
            total,
            done: 0,
        }
    }

    /// Hidden bar for non-interactive output
    pub fn hidden(total: usize) -> Self {
        Self {
            pb: ProgressBar::hidden(),
            total,
            done: 0,
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    fn set_status(&self, msg: &str) {
        self.pb
            .set_message(format!("[{}/{}] {msg}", self.done, self.total));
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_batch_start(&mut self, count: usize) {
        if count > 1 {
            self.set_status(&format!("applying {count} resources in parallel"));
        }
    }

    fn on_resource_start(&mut self, _id: &ResourceId, description: &str) {
        self.set_status(description);
    }

    fn on_phase(&mut self, id: &ResourceId, phase: &Phase) {
        match phase {
            Phase::Checking => self.set_status(&format!("checking {id}")),
            Phase::Creating => self.set_status(&format!("applying {id}")),
            _ => {}
        }
    }

    fn on_resource_complete(&mut self, id: &ResourceId, outcome: &Outcome) {
        self.done += 1;
        self.set_status(&format!("{id} {}", outcome.label()));
    }

    fn on_batch_complete(&mut self) {
        self.set_status("waiting");
    }
}
