use crate::error::Result;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory for one job: `frames/` holds what ffmpeg extracted,
/// `upscaled/` what the upscaler wrote. Removed on drop unless kept.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    keep: bool,
}

impl Workspace {
    pub const FRAME_PATTERN: &'static str = "frame_%08d.png";
    const FRAMES: &'static str = "frames";
    const UPSCALED: &'static str = "upscaled";

    pub fn create(parent: &Path, stem: &str, keep: bool) -> Result<Self> {
        fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!(".upscale-{}-", stem))
            .tempdir_in(parent)?;
        let root = dir.path().to_path_buf();
        fs::create_dir(root.join(Self::FRAMES))?;
        fs::create_dir(root.join(Self::UPSCALED))?;
        Ok(Self { dir: Some(dir), root, keep })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frames(&self) -> PathBuf {
        self.root.join(Self::FRAMES)
    }

    pub fn upscaled(&self) -> PathBuf {
        self.root.join(Self::UPSCALED)
    }

    pub fn frame_pattern(dir: &Path) -> PathBuf {
        dir.join(Self::FRAME_PATTERN)
    }

    /// First frame written by ffmpeg's `%08d` numbering.
    pub fn first_frame(dir: &Path) -> PathBuf {
        dir.join("frame_00000001.png")
    }

    pub fn count_frames(dir: &Path) -> Result<usize> {
        let count = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with("frame_") && name.ends_with(".png")
            })
            .count();
        Ok(count)
    }

    /// Deletes the extracted frames once they have been upscaled, halving
    /// the disk usage during reassembly.
    pub fn release_frames(&self) -> Result<()> {
        if self.keep {
            return Ok(());
        }
        fs::remove_dir_all(self.frames())?;
        Ok(())
    }

    /// Explicit cleanup so removal errors can be reported. Dropping the
    /// workspace does the same but ignores failures.
    pub fn close(mut self) -> Result<Option<PathBuf>> {
        match self.dir.take() {
            Some(dir) if self.keep => {
                let path = dir.keep();
                tracing::info!(workspace = %path.display(), "keeping temporary files");
                Ok(Some(path))
            }
            Some(dir) => {
                dir.close()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.keep {
                let path = dir.keep();
                tracing::info!(workspace = %path.display(), "keeping temporary files");
            }
        }
    }
}
