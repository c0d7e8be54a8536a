use super::{Job, JobProgress};

use crate::config::{AudioMode, Settings};
use crate::error::Result;
use crate::tools::Toolchain;
use crate::video::Video;
use crate::workspace::Workspace;

use std::path::Path;
use std::process::Command;

pub struct Merge;

impl Merge {

    fn command(tools: &Toolchain, settings: &Settings, video: &Video, input: &Path, upscaled: &Path, output: &Path) -> Command {
        let mut command = tools.ffmpeg.command();
        command
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-framerate").arg(video.frame_rate().to_string())
            .args(["-start_number", "1"])
            .arg("-i").arg(Workspace::frame_pattern(upscaled));

        let with_audio = video.has_audio && settings.encode.audio != AudioMode::None;
        if with_audio {
            command
                .arg("-i").arg(input)
                .args(["-map", "0:v:0", "-map", "1:a?", "-map_metadata", "1"]);
            match settings.encode.audio {
                AudioMode::Copy => {
                    command.args(["-c:a", "copy"]);
                }
                AudioMode::Aac => {
                    command.args(["-c:a", "aac"]);
                    if let Some(bitrate) = video.audio_bitrate {
                        command.arg("-b:a").arg(bitrate.to_string());
                    }
                }
                AudioMode::None => {}
            }
        } else {
            command.arg("-an");
        }

        command
            .arg("-c:v").arg(&settings.encode.encoder)
            .arg("-crf").arg(settings.encode.crf.to_string())
            .arg("-preset").arg(&settings.encode.preset)
            .arg("-pix_fmt").arg(&settings.encode.pix_fmt)
            .arg(if settings.run.overwrite { "-y" } else { "-n" })
            .arg(output);
        command
    }

    /// Encodes the upscaled frames into the job's output. A partially
    /// written output is removed when ffmpeg fails.
    pub fn execute(tools: &Toolchain, settings: &Settings, video: &Video, job: &Job, workspace: &Workspace, bar: &JobProgress) -> Result<()> {
        if let Some(parent) = job.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let existed = job.output.exists();
        let mut command = Self::command(tools, settings, video, &job.input, &workspace.upscaled(), &job.output);
        let result = crate::command::run_polling(&mut command, || bar.tick());
        if let Err(error) = result {
            if job.output.exists() && (!existed || settings.run.overwrite) {
                let _ = std::fs::remove_file(&job.output);
            }
            return Err(error);
        }
        tracing::info!(output = %job.output.display(), "reassembled");
        Ok(())
    }

}
