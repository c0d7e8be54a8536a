//! Per-video job: probe, extract, upscale, reassemble, clean up.
//!
//! Stages run strictly in order. The first failing stage ends the job and
//! is recorded in the report; other jobs are not affected.

mod extract;
mod upscale;
mod merge;
mod pool;
mod progress;

pub use pool::Pool;
pub use progress::{JobProgress, Progress};

use extract::Extract;
use upscale::Upscale;
use merge::Merge;

use crate::config::Settings;
use crate::error::Error;
use crate::report::{JobReport, Outcome};
use crate::tools::Toolchain;
use crate::video::Video;
use crate::workspace::Workspace;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Probe,
    Extract,
    Upscale,
    Reassemble,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Probe => "probe",
            Stage::Extract => "extract",
            Stage::Upscale => "upscale",
            Stage::Reassemble => "reassemble",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running(Stage),
    Done,
    Skipped,
    Failed(Stage),
}

impl JobState {
    /// The stage a failure in this state is attributed to.
    fn failing_stage(self) -> Stage {
        match self {
            JobState::Running(stage) | JobState::Failed(stage) => stage,
            _ => Stage::Probe,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Pending => f.write_str("pending"),
            JobState::Running(stage) => write!(f, "{}", stage),
            JobState::Done => f.write_str("done"),
            JobState::Skipped => f.write_str("skipped"),
            JobState::Failed(stage) => write!(f, "failed during {}", stage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Job {
    const OUTPUT_PREFIX: &'static str = "upscaled_";

    /// One job per input. Outputs are `upscaled_<stem>.<container>` in the
    /// destination folder (or next to the input), numbered when two inputs
    /// would otherwise write the same file.
    pub fn plan(inputs: &[PathBuf], settings: &Settings) -> Vec<Job> {
        let mut taken: HashSet<PathBuf> = inputs.iter().cloned().collect();
        inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let folder = settings
                    .destination
                    .clone()
                    .unwrap_or_else(|| Self::input_folder(input));
                let output = Self::unique_output(&folder, &Self::stem(input), settings.container(), &mut taken);
                Job { index, input: input.clone(), output }
            })
            .collect()
    }

    fn input_folder(input: &Path) -> PathBuf {
        match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn stem(input: &Path) -> String {
        input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string())
    }

    fn unique_output(folder: &Path, stem: &str, container: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
        let mut candidate = folder.join(format!("{}{}.{}", Self::OUTPUT_PREFIX, stem, container));
        let mut counter = 2;
        while taken.contains(&candidate) {
            candidate = folder.join(format!("{}{}-{}.{}", Self::OUTPUT_PREFIX, stem, counter, container));
            counter += 1;
        }
        taken.insert(candidate.clone());
        candidate
    }

    pub fn name(&self) -> String {
        self.input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }

    fn workspace_parent(&self) -> PathBuf {
        Self::input_folder(&self.output)
    }
}

pub struct Pipeline<'a> {
    settings: &'a Settings,
    tools: &'a Toolchain,
    progress: Progress,
}

impl<'a> Pipeline<'a> {
    pub fn new(settings: &'a Settings, tools: &'a Toolchain, total: usize) -> Self {
        let progress = if settings.quiet {
            Progress::hidden(total)
        } else {
            Progress::new(total)
        };
        Self { settings, tools, progress }
    }

    pub fn execute(&self, jobs: Vec<Job>) -> Vec<JobReport> {
        let reports = Pool::execute(jobs, self.settings.run.workers, |job| self.run_job(job));
        self.progress.finish();
        reports
    }

    fn run_job(&self, job: Job) -> JobReport {
        let started = Instant::now();
        let span = tracing::info_span!("job", input = %job.input.display());
        let _entered = span.enter();

        let bar = self.progress.job(&job);
        let mut state = JobState::Pending;

        let outcome = if job.output.exists() && !self.settings.run.overwrite {
            tracing::warn!(output = %job.output.display(), "output exists, skipping");
            state = JobState::Skipped;
            Outcome::Skipped(format!("{} already exists", job.output.display()))
        } else {
            match self.process(&job, &bar, &mut state) {
                Ok(kept) => {
                    state = JobState::Done;
                    tracing::info!(output = %job.output.display(), "finished");
                    Outcome::Done { kept }
                }
                Err(error) => {
                    let stage = state.failing_stage();
                    state = JobState::Failed(stage);
                    tracing::error!(%stage, %error, "job failed");
                    Outcome::Failed { stage, error }
                }
            }
        };

        bar.finish(&state);
        self.progress.job_finished();
        JobReport { input: job.input, output: job.output, outcome, elapsed: started.elapsed() }
    }

    fn enter(state: &mut JobState, stage: Stage, bar: &JobProgress) {
        *state = JobState::Running(stage);
        bar.enter(stage);
        tracing::info!(%stage, "entering stage");
    }

    fn process(&self, job: &Job, bar: &JobProgress, state: &mut JobState) -> Result<Option<PathBuf>, Error> {
        Self::enter(state, Stage::Probe, bar);
        let video = Video::probe(self.tools, &job.input)?;
        tracing::info!(
            width = video.width,
            height = video.height,
            frame_rate = %video.frame_rate(),
            audio = video.has_audio,
            "probed"
        );

        Self::enter(state, Stage::Extract, bar);
        let workspace = Workspace::create(&job.workspace_parent(), &Job::stem(&job.input), self.settings.run.keep_temp)?;
        tracing::debug!(workspace = %workspace.root().display(), "workspace ready");
        let extracted = Extract::execute(self.tools, &job.input, &video, &workspace, bar)?;

        Self::enter(state, Stage::Upscale, bar);
        Upscale::execute(self.tools, &self.settings.upscale, &workspace, extracted, bar)?;
        workspace.release_frames()?;

        Self::enter(state, Stage::Reassemble, bar);
        Merge::execute(self.tools, self.settings, &video, job, &workspace, bar)?;

        Self::enter(state, Stage::Cleanup, bar);
        Ok(Self::kept_after_cleanup(workspace.close()))
    }

    /// The output is complete by now, so a failed removal only warns.
    fn kept_after_cleanup(closed: Result<Option<PathBuf>, Error>) -> Option<PathBuf> {
        closed.unwrap_or_else(|error| {
            tracing::warn!(%error, "could not remove temporary files");
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::Arguments;
    use crate::config::Config;
    use clap::Parser;

    fn settings(extra: &[&str]) -> Settings {
        let mut args = vec!["batch_upscaler"];
        args.extend_from_slice(extra);
        args.push("unused.mp4");
        Settings::resolve(&Arguments::parse_from(args), Config::default()).unwrap()
    }

    #[test]
    fn outputs_go_next_to_inputs_by_default() {
        let jobs = Job::plan(&[PathBuf::from("clips/intro.mov"), PathBuf::from("outro.mkv")], &settings(&[]));
        assert_eq!(jobs[0].output, PathBuf::from("clips/upscaled_intro.mp4"));
        assert_eq!(jobs[1].output, PathBuf::from("./upscaled_outro.mp4"));
        assert_eq!(jobs[1].index, 1);
    }

    #[test]
    fn outputs_go_to_destination() {
        let jobs = Job::plan(&[PathBuf::from("clips/intro.mov")], &settings(&["-o", "out", "--container", "mkv"]));
        assert_eq!(jobs[0].output, PathBuf::from("out/upscaled_intro.mkv"));
        assert_eq!(jobs[0].workspace_parent(), PathBuf::from("out"));
    }

    #[test]
    fn colliding_outputs_are_numbered() {
        let inputs = [PathBuf::from("a/clip.mp4"), PathBuf::from("b/clip.mkv"), PathBuf::from("c/clip.avi")];
        let jobs = Job::plan(&inputs, &settings(&["-o", "out"]));
        let outputs: Vec<_> = jobs.iter().map(|job| job.output.clone()).collect();
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("out/upscaled_clip.mp4"),
                PathBuf::from("out/upscaled_clip-2.mp4"),
                PathBuf::from("out/upscaled_clip-3.mp4"),
            ]
        );
    }

    #[test]
    fn output_never_overwrites_an_input() {
        let inputs = [PathBuf::from("v/clip.mp4"), PathBuf::from("v/upscaled_clip.mp4")];
        let jobs = Job::plan(&inputs, &settings(&[]));
        assert_eq!(jobs[0].output, PathBuf::from("v/upscaled_clip-2.mp4"));
        assert_eq!(jobs[1].output, PathBuf::from("v/upscaled_upscaled_clip.mp4"));
    }

    #[test]
    fn failures_are_attributed_to_the_running_stage() {
        assert_eq!(JobState::Running(Stage::Upscale).failing_stage(), Stage::Upscale);
        assert_eq!(JobState::Pending.failing_stage(), Stage::Probe);
        assert_eq!(JobState::Failed(Stage::Upscale).to_string(), "failed during upscale");
    }

    #[test]
    fn existing_output_is_skipped_without_running_tools() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"").unwrap();
        std::fs::write(dir.path().join("upscaled_clip.mp4"), b"").unwrap();

        let mut settings = settings(&["-q"]);
        settings.tools.ffprobe = PathBuf::from("/nonexistent/ffprobe");
        let tools = Toolchain::from_settings(&settings);
        let jobs = Job::plan(&[input], &settings);

        let reports = Pipeline::new(&settings, &tools, jobs.len()).execute(jobs);
        assert!(matches!(reports[0].outcome, Outcome::Skipped(_)));
    }

    #[test]
    fn cleanup_errors_do_not_fail_the_job() {
        let error = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "busy"));
        assert_eq!(Pipeline::kept_after_cleanup(Err(error)), None);
        let kept = PathBuf::from("out/.upscale-clip-x");
        assert_eq!(Pipeline::kept_after_cleanup(Ok(Some(kept.clone()))), Some(kept));
    }

    fn workspaces_in(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".upscale-"))
            .count()
    }

    #[test]
    fn probe_failure_is_reported_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"").unwrap();

        let mut settings = settings(&["-q"]);
        settings.tools.ffprobe = PathBuf::from("/nonexistent/ffprobe");
        let tools = Toolchain::from_settings(&settings);
        let jobs = Job::plan(&[input], &settings);

        let reports = Pipeline::new(&settings, &tools, jobs.len()).execute(jobs);
        match &reports[0].outcome {
            Outcome::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Probe);
                assert!(matches!(error, Error::ToolNotAvailable(_)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(workspaces_in(dir.path()), 0);
    }

    // Stand-in tools: ffprobe reports a 4x2 video, ffmpeg and the upscaler
    // copy PNG fixtures from FIXTURES into the directories they are given.
    #[cfg(unix)]
    const PROBE_SCRIPT: &str = r#"printf 'codec_type=video\nwidth=4\nheight=2\nr_frame_rate=30/1\nnb_frames=1\n'"#;

    #[cfg(unix)]
    const EXTRACT_ONE_FRAME: &str = r#"for last; do :; done
case "$*" in
  *fps=*) cp "FIXTURES/small.png" "$(dirname "$last")/frame_00000001.png" ;;
  *) echo video > "$last" ;;
esac"#;

    #[cfg(unix)]
    const ENCODER_FAILS: &str = r#"for last; do :; done
case "$*" in
  *fps=*) cp "FIXTURES/small.png" "$(dirname "$last")/frame_00000001.png" ;;
  *) echo partial > "$last"; echo "encoder boom" >&2; exit 1 ;;
esac"#;

    #[cfg(unix)]
    const UPSCALE_ONE_FRAME: &str = r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
cp "FIXTURES/big.png" "$out/frame_00000001.png""#;

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Runs one job on an empty `clip.mp4` with the given ffmpeg and
    /// upscaler script bodies. Returns the folder holding input and output.
    #[cfg(unix)]
    fn run_with(ffmpeg: &str, upscaler: &str) -> (tempfile::TempDir, JobReport) {
        let bin = tempfile::tempdir().unwrap();
        let videos = tempfile::tempdir().unwrap();
        let input = videos.path().join("clip.mp4");
        std::fs::write(&input, b"").unwrap();
        image::RgbImage::new(4, 2).save(bin.path().join("small.png")).unwrap();
        image::RgbImage::new(8, 4).save(bin.path().join("big.png")).unwrap();

        let fixtures = bin.path().display().to_string();
        let mut settings = settings(&["-q"]);
        settings.tools.ffprobe = script(bin.path(), "ffprobe", PROBE_SCRIPT);
        settings.tools.ffmpeg = script(bin.path(), "ffmpeg", &ffmpeg.replace("FIXTURES", &fixtures));
        settings.tools.upscaler = script(bin.path(), "upscaler", &upscaler.replace("FIXTURES", &fixtures));

        let tools = Toolchain::from_settings(&settings);
        let jobs = Job::plan(&[input], &settings);
        let mut reports = Pipeline::new(&settings, &tools, jobs.len()).execute(jobs);
        (videos, reports.remove(0))
    }

    #[cfg(unix)]
    #[test]
    fn completes_and_removes_workspace() {
        let (videos, report) = run_with(EXTRACT_ONE_FRAME, UPSCALE_ONE_FRAME);
        assert!(matches!(report.outcome, Outcome::Done { kept: None }), "{:?}", report.outcome);
        assert!(videos.path().join("upscaled_clip.mp4").is_file());
        assert_eq!(workspaces_in(videos.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn no_frames_fails_extract() {
        let (videos, report) = run_with("exit 0", UPSCALE_ONE_FRAME);
        match &report.outcome {
            Outcome::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Extract);
                assert!(matches!(error, Error::NoFramesExtracted(_)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(workspaces_in(videos.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn missing_upscaled_frames_fail_upscale() {
        let (videos, report) = run_with(EXTRACT_ONE_FRAME, "exit 0");
        match &report.outcome {
            Outcome::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Upscale);
                assert!(matches!(error, Error::FrameCountMismatch { expected: 1, found: 0 }));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(workspaces_in(videos.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn failed_reassembly_removes_partial_output() {
        let (videos, report) = run_with(ENCODER_FAILS, UPSCALE_ONE_FRAME);
        match &report.outcome {
            Outcome::Failed { stage, error: Error::ToolFailed { stderr, .. } } => {
                assert_eq!(*stage, Stage::Reassemble);
                assert!(stderr.contains("encoder boom"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!videos.path().join("upscaled_clip.mp4").exists());
        assert_eq!(workspaces_in(videos.path()), 0);
    }
}
