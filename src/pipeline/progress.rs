use super::{Job, JobState, Stage};

use std::fmt::Write;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

/// Overall bar counting finished videos, plus one bar per running job.
pub struct Progress {
    multi: MultiProgress,
    overall: ProgressBar,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::stderr())
    }

    pub fn hidden(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::hidden())
    }

    fn with_target(total: usize, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(total as u64));
        let style = ProgressStyle::with_template("[{elapsed_precise}] videos {pos}/{len} {percent} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key("percent", |state: &ProgressState, w: &mut dyn Write| {
                let _ = write!(w, "({:.0}%)", state.fraction() * 100.0);
            });
        overall.set_style(style);
        Self { multi, overall }
    }

    pub fn job(&self, job: &Job) -> JobProgress {
        let bar = self.multi.insert_before(&self.overall, ProgressBar::new(0));
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] [{wide_bar:.white/green}] {pos}/{len} {percent} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░-")
        .with_key("percent", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "({:.0}%)", state.fraction() * 100.0);
        });
        bar.set_style(style);
        bar.set_prefix(format!("#{} {}", job.index + 1, job.name()));
        bar.set_message(JobState::Pending.to_string());
        JobProgress { bar }
    }

    pub fn job_finished(&self) {
        self.overall.inc(1);
    }

    pub fn finish(&self) {
        self.overall.finish();
    }
}

pub struct JobProgress {
    bar: ProgressBar,
}

impl JobProgress {
    pub fn enter(&self, stage: Stage) {
        self.bar.set_length(0);
        self.bar.set_position(0);
        self.bar.set_message(stage.to_string());
    }

    /// Frame-level progress inside the current stage.
    pub fn frames(&self, done: u64, total: Option<u64>) {
        if let Some(total) = total {
            self.bar.set_length(total.max(done));
        }
        self.bar.set_position(done);
    }

    pub fn tick(&self) {
        self.bar.tick();
    }

    pub fn finish(&self, state: &JobState) {
        self.bar.finish_with_message(state.to_string());
    }
}
