use super::JobProgress;

use crate::config::UpscaleConfig;
use crate::error::{Error, Result};
use crate::tools::Toolchain;
use crate::workspace::Workspace;

use std::path::Path;
use std::process::Command;

pub struct Upscale;

impl Upscale {

    /// `realesrgan-ncnn-vulkan` style invocation over a whole directory.
    /// Output files keep the input names.
    fn command(tools: &Toolchain, options: &UpscaleConfig, frames: &Path, upscaled: &Path) -> Command {
        let mut command = tools.upscaler.command();
        command
            .arg("-i").arg(frames)
            .arg("-o").arg(upscaled)
            .arg("-n").arg(&options.model)
            .arg("-s").arg(options.scale.to_string())
            .args(["-f", "png"]);
        if let Some(model_dir) = tools.model_dir() {
            command.arg("-m").arg(model_dir);
        }
        if let Some(gpu) = &options.gpu {
            command.arg("-g").arg(gpu);
        }
        if let Some(tile) = options.tile {
            command.arg("-t").arg(tile.to_string());
        }
        if let Some(threads) = &options.threads {
            command.arg("-j").arg(threads);
        }
        command
    }

    pub fn execute(tools: &Toolchain, options: &UpscaleConfig, workspace: &Workspace, extracted: usize, bar: &JobProgress) -> Result<()> {
        let frames = workspace.frames();
        let upscaled = workspace.upscaled();
        let mut command = Self::command(tools, options, &frames, &upscaled);
        crate::command::run_polling(&mut command, || {
            if let Ok(done) = Workspace::count_frames(&upscaled) {
                bar.frames(done as u64, Some(extracted as u64));
            }
        })?;

        Self::verify(&frames, &upscaled, extracted, options.scale)?;
        tracing::info!(frames = extracted, scale = options.scale, "upscaled");
        Ok(())
    }

    /// The upscaler exits 0 even when some frames failed to load, so the
    /// output is checked: one file per source frame, at `scale` times the size.
    fn verify(frames: &Path, upscaled: &Path, extracted: usize, scale: u32) -> Result<()> {
        let found = Workspace::count_frames(upscaled)?;
        if found != extracted {
            return Err(Error::FrameCountMismatch { expected: extracted, found });
        }

        let (width, height) = image::image_dimensions(Workspace::first_frame(frames))?;
        let (found_width, found_height) = image::image_dimensions(Workspace::first_frame(upscaled))?;
        let (expected_width, expected_height) = (width * scale, height * scale);
        if (found_width, found_height) != (expected_width, expected_height) {
            return Err(Error::UnexpectedResolution { expected_width, expected_height, found_width, found_height });
        }
        Ok(())
    }

}
