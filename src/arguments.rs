use crate::error::Error;

use clap::{ArgAction, Parser, ValueEnum};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Upscale videos with ffmpeg and a Real-ESRGAN compatible upscaler
#[derive(Parser, Debug)]
#[command(name = "batch_upscaler", version, long_about = None)]
pub struct Arguments {
    /// Video files or directories containing videos
    #[arg(required_unless_present = "list_models", value_name = "INPUTS")]
    pub inputs: Vec<PathBuf>,

    /// Destination folder [default: folder of each input]
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Upscaler model name
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Upscale ratio (2, 3, 4)
    #[arg(short = 's', long, value_parser = clap::value_parser!(u32).range(2..=4))]
    pub scale: Option<u32>,

    /// Number of videos processed in parallel
    #[arg(short = 'j', long, value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// ffmpeg video encoder
    #[arg(short = 'e', long)]
    pub encoder: Option<String>,

    /// Constant rate factor (0-51)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=51))]
    pub crf: Option<u32>,

    /// Encoder preset
    #[arg(long)]
    pub preset: Option<String>,

    /// What to do with the original audio
    #[arg(long, value_enum)]
    pub audio: Option<AudioArg>,

    /// Output container extension
    #[arg(long)]
    pub container: Option<String>,

    /// GPU device(s) passed to the upscaler
    #[arg(short = 'g', long)]
    pub gpu: Option<String>,

    /// Path to the ffmpeg binary
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long, value_name = "PATH")]
    pub ffprobe: Option<PathBuf>,

    /// Path to the upscaler binary
    #[arg(long, value_name = "PATH")]
    pub upscaler: Option<PathBuf>,

    /// Directory with the upscaler's model files
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Keep extracted and upscaled frames
    #[arg(long)]
    pub keep_temp: bool,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Print the models found in the model directory and exit
    #[arg(long)]
    pub list_models: bool,

    /// Print the jobs without running any tool
    #[arg(long)]
    pub dry_run: bool,

    /// Hide progress bars
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioArg {
    /// Stream-copy the original audio
    Copy,
    /// Re-encode the original audio to AAC
    Aac,
    /// Drop audio
    None,
}

impl Arguments {
    const FORMATS: [&'static str; 6] = ["mp4", "mov", "mkv", "webm", "avi", "flv"];

    /// Expands directories and keeps only files with a known video extension.
    /// Explicitly named files are kept whatever their extension.
    pub fn collect_inputs(&self) -> Result<Vec<PathBuf>, Error> {
        let mut files = Vec::new();
        for input in &self.inputs {
            if input.is_dir() {
                files.extend(Self::files_from_directory(input)?);
            } else if input.is_file() {
                files.push(input.clone());
            } else {
                return Err(Error::InvalidInputPath(input.clone()));
            }
        }

        let mut seen = std::collections::HashSet::new();
        files.retain(|file| seen.insert(file.clone()));

        if files.is_empty() {
            return Err(Error::InputFilesNotFound);
        }
        Ok(files)
    }

    fn files_from_directory(dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && Self::is_video(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(str::to_lowercase)
            .is_some_and(|ext| Self::FORMATS.contains(&ext.as_str()))
    }

    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "batch_upscaler=warn",
            1 => "batch_upscaler=info",
            2 => "batch_upscaler=debug",
            _ => "batch_upscaler=trace",
        }
    }
}
