use crate::config::Settings;
use crate::error::{Error, Result};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone)]
pub struct Tool {
    pub name: &'static str,
    pub program: PathBuf,
}

impl Tool {
    pub fn new(name: &'static str, program: impl Into<PathBuf>) -> Self {
        Self { name, program: program.into() }
    }

    pub fn command(&self) -> Command {
        Command::new(&self.program)
    }

    /// Only a missing binary is an error; anything else that prevents a
    /// clean start (bad flags, no GPU) surfaces later in the stage itself.
    pub fn check(&self) -> Result<()> {
        let spawned = Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::ToolNotAvailable(format!("{} ({})", self.name, self.program.display())))
            }
            Err(_) => Ok(()),
            Ok(mut child) => {
                let _ = child.kill();
                let _ = child.wait();
                Ok(())
            }
        }
    }
}

/// The three programs every job shells out to.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: Tool,
    pub ffprobe: Tool,
    pub upscaler: Tool,
    pub model_dir: Option<PathBuf>,
}

impl Toolchain {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ffmpeg: Tool::new("ffmpeg", &settings.tools.ffmpeg),
            ffprobe: Tool::new("ffprobe", &settings.tools.ffprobe),
            upscaler: Tool::new("upscaler", &settings.tools.upscaler),
            model_dir: settings.tools.model_dir.clone(),
        }
    }

    pub fn validate(&self, settings: &Settings) -> Result<()> {
        self.ffmpeg.check()?;
        self.ffprobe.check()?;
        self.upscaler.check()?;
        if let Some(model_dir) = &self.model_dir {
            if !model_dir.is_dir() {
                return Err(Error::Config(format!("model directory not found: {}", model_dir.display())));
            }
            crate::model::find(model_dir, &settings.upscale.model, settings.upscale.scale)?;
        }
        self.validate_encoder(&settings.encode.encoder)
    }

    fn validate_encoder(&self, encoder: &str) -> Result<()> {
        let mut command = self.ffmpeg.command();
        command.args(["-hide_banner", "-encoders"]);
        let output = crate::command::run(&mut command)?;
        let listing = String::from_utf8_lossy(&output.stdout);
        if Self::lists_encoder(&listing, encoder) {
            Ok(())
        } else {
            Err(Error::UnsupportedEncoder(encoder.to_string()))
        }
    }

    /// Encoder lines look like ` V....D libx264              libx264 H.264 ...`;
    /// the name is the second column.
    fn lists_encoder(listing: &str, encoder: &str) -> bool {
        listing
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .any(|name| name == encoder)
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }
}
