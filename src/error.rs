use std::path::PathBuf;

use image::error::ImageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read upscaled frame: {0}")]
    Image(#[from] ImageError),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0} is not available on this system")]
    ToolNotAvailable(String),

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Model {model} is not available in {}", .dir.display())]
    ModelNotFound { model: String, dir: PathBuf },

    #[error("The encoder is not supported by ffmpeg: {0}")]
    UnsupportedEncoder(String),

    #[error("The specified input path is invalid: {}", .0.display())]
    InvalidInputPath(PathBuf),

    #[error("No video files found in the given inputs")]
    InputFilesNotFound,

    #[error("Failed to read video metadata: {0}")]
    Metadata(String),

    #[error("No frames were extracted from {}", .0.display())]
    NoFramesExtracted(PathBuf),

    #[error("Upscaler produced {found} frames, expected {expected}")]
    FrameCountMismatch { expected: usize, found: usize },

    #[error("Upscaled frame is {found_width}x{found_height}, expected {expected_width}x{expected_height}")]
    UnexpectedResolution {
        expected_width: u32,
        expected_height: u32,
        found_width: u32,
        found_height: u32,
    },
}
