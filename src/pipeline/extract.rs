use super::JobProgress;

use crate::error::{Error, Result};
use crate::tools::Toolchain;
use crate::video::Video;
use crate::workspace::Workspace;

use std::path::Path;
use std::process::Command;

pub struct Extract;

impl Extract {

    fn command(tools: &Toolchain, input: &Path, video: &Video, frames: &Path) -> Command {
        let mut command = tools.ffmpeg.command();
        command
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-i").arg(input)
            .args(["-map", "0:v:0"])
            .arg("-vf").arg(format!("fps={}", video.frame_rate()))
            .args(["-start_number", "1"])
            .arg(Workspace::frame_pattern(frames));
        command
    }

    /// Writes every frame of `input` as PNG into the workspace and returns
    /// how many were written.
    pub fn execute(tools: &Toolchain, input: &Path, video: &Video, workspace: &Workspace, bar: &JobProgress) -> Result<usize> {
        let frames = workspace.frames();
        let mut command = Self::command(tools, input, video, &frames);
        crate::command::run_polling(&mut command, || {
            if let Ok(done) = Workspace::count_frames(&frames) {
                bar.frames(done as u64, video.frame_count);
            }
        })?;

        let extracted = Workspace::count_frames(&frames)?;
        if extracted == 0 {
            return Err(Error::NoFramesExtracted(input.to_path_buf()));
        }
        tracing::info!(frames = extracted, "extracted");
        Ok(extracted)
    }

}
