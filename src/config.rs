//! Configuration file and the merged run settings.
//!
//! Values come from three layers: built-in defaults, an optional TOML file
//! and command-line flags, in increasing priority.

use crate::arguments::{Arguments, AudioArg};
use crate::error::{Error, Result};

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tools: ToolsConfig,
    pub upscale: UpscaleConfig,
    pub encode: EncodeConfig,
    pub run: RunConfig,
}

/// Locations of the external programs
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub upscaler: PathBuf,
    /// Directory holding the upscaler's model files (`-m`)
    pub model_dir: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            upscaler: PathBuf::from("realesrgan-ncnn-vulkan"),
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpscaleConfig {
    pub model: String,
    pub scale: u32,
    pub gpu: Option<String>,
    pub tile: Option<u32>,
    /// Thread layout passed as `-j load:proc:save`
    pub threads: Option<String>,
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            model: String::from("realesr-animevideov3"),
            scale: 2,
            gpu: None,
            tile: None,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeConfig {
    pub encoder: String,
    pub crf: u32,
    pub preset: String,
    pub pix_fmt: String,
    pub audio: AudioMode,
    pub container: String,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            encoder: String::from("libx264"),
            crf: 18,
            preset: String::from("medium"),
            pix_fmt: String::from("yuv420p"),
            audio: AudioMode::Copy,
            container: String::from("mp4"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub workers: usize,
    pub keep_temp: bool,
    pub overwrite: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { workers: 1, keep_temp: false, overwrite: false }
    }
}

/// What happens to the source audio during reassembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    #[default]
    Copy,
    Aac,
    None,
}

impl From<AudioArg> for AudioMode {
    fn from(arg: AudioArg) -> Self {
        match arg {
            AudioArg::Copy => AudioMode::Copy,
            AudioArg::Aac => AudioMode::Aac,
            AudioArg::None => AudioMode::None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Everything a job needs, after merging defaults, file and flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tools: ToolsConfig,
    pub upscale: UpscaleConfig,
    pub encode: EncodeConfig,
    pub run: RunConfig,
    pub destination: Option<PathBuf>,
    pub dry_run: bool,
    pub quiet: bool,
}

impl Settings {
    pub const MAX_CRF: u32 = 51;

    pub fn resolve(arguments: &Arguments, config: Config) -> Result<Self> {
        let Config { mut tools, mut upscale, mut encode, mut run } = config;

        if let Some(ffmpeg) = &arguments.ffmpeg {
            tools.ffmpeg = ffmpeg.clone();
        }
        if let Some(ffprobe) = &arguments.ffprobe {
            tools.ffprobe = ffprobe.clone();
        }
        if let Some(upscaler) = &arguments.upscaler {
            tools.upscaler = upscaler.clone();
        }
        if let Some(model_dir) = &arguments.model_dir {
            tools.model_dir = Some(model_dir.clone());
        }
        if let Some(model) = &arguments.model {
            upscale.model = model.clone();
        }
        if let Some(scale) = arguments.scale {
            upscale.scale = scale;
        }
        if let Some(gpu) = &arguments.gpu {
            upscale.gpu = Some(gpu.clone());
        }
        if let Some(encoder) = &arguments.encoder {
            encode.encoder = encoder.clone();
        }
        if let Some(crf) = arguments.crf {
            encode.crf = crf;
        }
        if let Some(preset) = &arguments.preset {
            encode.preset = preset.clone();
        }
        if let Some(audio) = arguments.audio {
            encode.audio = audio.into();
        }
        if let Some(container) = &arguments.container {
            encode.container = container.clone();
        }
        if let Some(workers) = arguments.workers {
            run.workers = workers;
        }
        run.keep_temp |= arguments.keep_temp;
        run.overwrite |= arguments.overwrite;

        let settings = Self {
            tools,
            upscale,
            encode,
            run,
            destination: arguments.output.clone(),
            dry_run: arguments.dry_run,
            quiet: arguments.quiet,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(2..=4).contains(&self.upscale.scale) {
            return Err(Error::Config(format!("scale must be 2, 3 or 4, got {}", self.upscale.scale)));
        }
        if self.run.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.encode.crf > Self::MAX_CRF {
            return Err(Error::Config(format!("crf must be between 0 and {}, got {}", Self::MAX_CRF, self.encode.crf)));
        }
        if self.upscale.model.trim().is_empty() {
            return Err(Error::Config("model cannot be empty".to_string()));
        }
        crate::model::validate_scale(&self.upscale.model, self.upscale.scale)?;
        let container = self.encode.container.trim_start_matches('.');
        if container.is_empty() || container.contains(['/', '\\']) {
            return Err(Error::Config(format!("invalid container extension: {:?}", self.encode.container)));
        }
        Ok(())
    }

    pub fn container(&self) -> &str {
        self.encode.container.trim_start_matches('.')
    }
}
