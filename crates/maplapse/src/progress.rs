use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use maplapse_types::GameClock;

use crate::pipeline::RunSummary;

/// Operator-facing progress line: cycle counter plus the latest acceptance.
pub struct CycleProgress {
    bar: ProgressBar,
}

impl CycleProgress {
    pub fn new(estimated_cycles: Option<u64>) -> Self {
        let bar = match estimated_cycles {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{bar:40.cyan/blue} {percent:>3}% cycle {pos}/{len} [{elapsed_precise}] {msg}",
                    )
                    .expect("progress template is valid"),
                );
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.cyan.bold} [{elapsed_precise}] cycle {pos} {msg}",
                    )
                    .expect("progress template is valid")
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
                );
                spinner
            }
        };
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Silent progress for tests and non-interactive callers.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn on_cycle(&self, cycle: u64) {
        self.bar.set_position(cycle);
    }

    pub fn on_accept(&self, frames: u64, clock: Option<GameClock>) {
        match clock {
            Some(clock) => self.bar.set_message(format!("{frames} frames @ {clock}")),
            None => self.bar.set_message(format!("{frames} frames")),
        }
    }

    pub fn finish(&self, summary: &RunSummary) {
        self.bar.finish_with_message(format!(
            "completed {} cycles, {} frames",
            summary.cycles, summary.frames_written
        ));
    }

    pub fn abandon(&self) {
        self.bar
            .abandon_with_message("run failed".to_owned());
    }
}
