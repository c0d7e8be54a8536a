use crate::error::Error;
use crate::pipeline::Stage;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug)]
pub enum Outcome {
    Done { kept: Option<PathBuf> },
    Skipped(String),
    Failed { stage: Stage, error: Error },
}

#[derive(Debug)]
pub struct JobReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

impl JobReport {
    pub fn line(&self) -> String {
        let input = self.input.display();
        match &self.outcome {
            Outcome::Done { kept: None } => {
                format!("done     {} -> {} ({:.1}s)", input, self.output.display(), self.elapsed.as_secs_f64())
            }
            Outcome::Done { kept: Some(workspace) } => format!(
                "done     {} -> {} ({:.1}s, frames kept in {})",
                input,
                self.output.display(),
                self.elapsed.as_secs_f64(),
                workspace.display()
            ),
            Outcome::Skipped(reason) => format!("skipped  {}: {}", input, reason),
            Outcome::Failed { stage, error } => format!("failed   {} during {}: {}", input, stage, error),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn new(reports: &[JobReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            match report.outcome {
                Outcome::Done { .. } => summary.succeeded += 1,
                Outcome::Skipped(_) => summary.skipped += 1,
                Outcome::Failed { .. } => summary.failed += 1,
            }
            summary
        })
    }

    pub fn print(&self, reports: &[JobReport]) {
        for report in reports {
            println!("{}", report.line());
        }
        println!(
            "Completed: {} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        );
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.failed == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: Outcome) -> JobReport {
        JobReport {
            input: PathBuf::from("clip.mp4"),
            output: PathBuf::from("upscaled_clip.mp4"),
            outcome,
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn counts_outcomes() {
        let reports = vec![
            report(Outcome::Done { kept: None }),
            report(Outcome::Skipped("exists".to_string())),
            report(Outcome::Failed { stage: Stage::Upscale, error: Error::FrameCountMismatch { expected: 3, found: 2 } }),
            report(Outcome::Done { kept: None }),
        ];
        let summary = Summary::new(&reports);
        assert_eq!(summary, Summary { succeeded: 2, skipped: 1, failed: 1 });
    }

    #[test]
    fn skipped_jobs_are_not_failures() {
        let summary = Summary::new(&[report(Outcome::Done { kept: None }), report(Outcome::Skipped("exists".to_string()))]);
        assert_eq!(summary, Summary { succeeded: 1, skipped: 1, failed: 0 });
    }

    #[test]
    fn lines_name_the_failing_stage() {
        let line = report(Outcome::Failed {
            stage: Stage::Upscale,
            error: Error::FrameCountMismatch { expected: 3, found: 2 },
        })
        .line();
        assert_eq!(line, "failed   clip.mp4 during upscale: Upscaler produced 2 frames, expected 3");

        let line = report(Outcome::Done { kept: None }).line();
        assert_eq!(line, "done     clip.mp4 -> upscaled_clip.mp4 (1.5s)");
    }
}
