use crate::error::{Error, Result};
use crate::tools::Toolchain;

use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Exact frame rate as reported by ffprobe, e.g. `30000/1001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub const DEFAULT: FrameRate = FrameRate { numerator: 30, denominator: 1 };

    /// Accepts `num/den` or a plain number. Zero or malformed rates are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let rate = match value.split_once('/') {
            Some((num, den)) => Self {
                numerator: num.trim().parse().ok()?,
                denominator: den.trim().parse().ok()?,
            },
            None => Self::from_decimal(value)?,
        };
        (rate.numerator > 0 && rate.denominator > 0).then_some(rate)
    }

    fn from_decimal(value: &str) -> Option<Self> {
        match value.split_once('.') {
            None => Some(Self { numerator: value.parse().ok()?, denominator: 1 }),
            Some((whole, fraction)) => {
                let digits = fraction.len().min(3) as u32;
                let denominator = 10u32.pow(digits);
                let whole: u32 = whole.parse().ok()?;
                let fraction: u32 = if digits == 0 { 0 } else { fraction.get(..digits as usize)?.parse().ok()? };
                Some(Self { numerator: whole * denominator + fraction, denominator })
            }
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<FrameRate>,
    pub frame_count: Option<u64>,
    pub has_audio: bool,
    pub audio_bitrate: Option<u64>,
}

impl Video {
    pub fn probe(tools: &Toolchain, input: &Path) -> Result<Self> {
        let mut command = tools.ffprobe.command();
        command
            .args(["-hide_banner", "-v", "error", "-show_entries"])
            .arg("stream=codec_type,width,height,r_frame_rate,nb_frames,bit_rate")
            .args(["-of", "default=noprint_wrappers=1"])
            .arg(input);
        let output = crate::command::run(&mut command)?;
        let mut video = Self::from_probe_output(&String::from_utf8_lossy(&output.stdout))?;

        if video.frame_rate.is_none() {
            video.frame_rate = Self::probe_ffmpeg_frame_rate(tools, input);
        }
        if video.frame_rate.is_none() {
            tracing::warn!(input = %input.display(), "frame rate unknown, using {}", FrameRate::DEFAULT);
        }
        Ok(video)
    }

    /// Parses ffprobe `key=value` output. The first video stream provides
    /// dimensions and frame rate, the first audio stream the bitrate.
    pub fn from_probe_output(data: &str) -> Result<Self> {
        let mut streams: Vec<Vec<(&str, &str)>> = Vec::new();
        for line in data.lines() {
            if let Some((key, value)) = line.trim().split_once('=') {
                if key == "codec_type" || streams.is_empty() {
                    streams.push(Vec::new());
                }
                if let Some(stream) = streams.last_mut() {
                    stream.push((key, value));
                }
            }
        }

        fn field(stream: &[(&str, &str)], name: &str) -> Option<String> {
            stream.iter().find(|(key, _)| *key == name).map(|(_, value)| value.to_string())
        }
        fn is_type(stream: &[(&str, &str)], kind: &str) -> bool {
            field(stream, "codec_type").as_deref() == Some(kind)
        }

        let video_stream = streams
            .iter()
            .map(Vec::as_slice)
            .find(|stream| is_type(stream, "video"))
            .ok_or_else(|| Error::Metadata("no video stream found".to_string()))?;
        let audio_stream = streams.iter().map(Vec::as_slice).find(|stream| is_type(stream, "audio"));

        let dimension = |name: &str| -> Result<u32> {
            field(video_stream, name)
                .and_then(|value| value.parse::<u32>().ok())
                .filter(|value| *value > 0)
                .ok_or_else(|| Error::Metadata(format!("missing {}", name)))
        };

        Ok(Self {
            width: dimension("width")?,
            height: dimension("height")?,
            frame_rate: field(video_stream, "r_frame_rate").and_then(|value| FrameRate::parse(&value)),
            frame_count: field(video_stream, "nb_frames")
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|count| *count > 0),
            has_audio: audio_stream.is_some(),
            audio_bitrate: audio_stream
                .and_then(|stream| field(stream, "bit_rate"))
                .and_then(|value| value.parse::<u64>().ok()),
        })
    }

    fn probe_ffmpeg_frame_rate(tools: &Toolchain, input: &Path) -> Option<FrameRate> {
        let mut command = tools.ffmpeg.command();
        command.arg("-hide_banner").arg("-i").arg(input);
        let output = crate::command::run_unchecked(&mut command).ok()?;
        Self::frame_rate_from_banner(&String::from_utf8_lossy(&output.stderr))
    }

    /// Reads the `29.97 fps` token ffmpeg prints for each video stream.
    pub fn frame_rate_from_banner(stderr: &str) -> Option<FrameRate> {
        static FPS: OnceLock<Option<Regex>> = OnceLock::new();
        FPS.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?) fps").ok())
            .as_ref()?
            .captures(stderr)
            .and_then(|captures| captures.get(1))
            .and_then(|value| FrameRate::parse(value.as_str()))
    }

    /// ffprobe first, then the ffmpeg banner, then 30 fps.
    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate.unwrap_or(FrameRate::DEFAULT)
    }
}
