//! Upscaler models, the scales they produce and their files on disk.

use crate::error::{Error, Result};

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

/// Models shipped with realesrgan-ncnn-vulkan. Anything else is a custom
/// model and is passed through unchecked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Model {
    AnimeVideo,
    RealEsrgan,
    RealEsrganAnime,
    RealEsrnet,
}

impl Model {
    const ALL: [Model; 4] = [Model::AnimeVideo, Model::RealEsrgan, Model::RealEsrganAnime, Model::RealEsrnet];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|model| model.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Model::AnimeVideo => "realesr-animevideov3",
            Model::RealEsrgan => "realesrgan-x4plus",
            Model::RealEsrganAnime => "realesrgan-x4plus-anime",
            Model::RealEsrnet => "realesrnet-x4plus",
        }
    }

    /// The animevideo model has one file per scale, the others only work at x4.
    pub fn supports(&self, scale: u32) -> bool {
        match self {
            Model::AnimeVideo => (2..=4).contains(&scale),
            _ => scale == 4,
        }
    }

    fn per_scale_files(&self) -> bool {
        matches!(self, Model::AnimeVideo)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rejects a known model asked for a scale it was not trained for.
pub fn validate_scale(name: &str, scale: u32) -> Result<()> {
    match Model::from_name(name) {
        Some(model) if !model.supports(scale) => {
            Err(Error::Config(format!("model {} cannot upscale x{}", model, scale)))
        }
        _ => Ok(()),
    }
}

/// File stems the upscaler may load for `name` at `scale`, most specific first.
fn file_stems(name: &str, scale: u32) -> Vec<String> {
    match Model::from_name(name) {
        Some(model) if model.per_scale_files() => vec![format!("{}-x{}", name, scale)],
        Some(_) => vec![name.to_string()],
        None => vec![format!("{}-x{}", name, scale), name.to_string()],
    }
}

/// Checks that `<stem>.param` and `<stem>.bin` exist in the model directory.
pub fn find(dir: &Path, name: &str, scale: u32) -> Result<()> {
    let found = file_stems(name, scale).iter().any(|stem| {
        dir.join(format!("{}.param", stem)).is_file() && dir.join(format!("{}.bin", stem)).is_file()
    });
    if found {
        Ok(())
    } else {
        Err(Error::ModelNotFound { model: name.to_string(), dir: dir.to_path_buf() })
    }
}

/// Stems of every `.bin` file in the model directory, sorted.
pub fn list(dir: &Path) -> Result<Vec<String>> {
    let mut models: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().and_then(OsStr::to_str) == Some("bin"))
        .filter_map(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .collect();
    models.sort();
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn model_dir(stems: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for stem in stems {
            fs::write(dir.path().join(format!("{}.param", stem)), b"").unwrap();
            fs::write(dir.path().join(format!("{}.bin", stem)), b"").unwrap();
        }
        dir
    }

    #[test]
    fn known_models_limit_scale() {
        assert!(validate_scale("realesr-animevideov3", 2).is_ok());
        assert!(validate_scale("realesr-animevideov3", 3).is_ok());
        assert!(validate_scale("realesrgan-x4plus", 4).is_ok());
        assert!(matches!(validate_scale("realesrgan-x4plus", 2), Err(Error::Config(_))));
        assert!(matches!(validate_scale("realesrgan-x4plus-anime", 3), Err(Error::Config(_))));
    }

    #[test]
    fn custom_models_are_not_checked() {
        assert!(validate_scale("my-finetune", 2).is_ok());
    }

    #[test]
    fn finds_per_scale_files() {
        let dir = model_dir(&["realesr-animevideov3-x2", "realesrgan-x4plus"]);
        assert!(find(dir.path(), "realesr-animevideov3", 2).is_ok());
        assert!(find(dir.path(), "realesrgan-x4plus", 4).is_ok());
        assert!(matches!(
            find(dir.path(), "realesr-animevideov3", 3),
            Err(Error::ModelNotFound { .. })
        ));
    }

    #[test]
    fn custom_model_with_or_without_scale_suffix() {
        let dir = model_dir(&["custom-x2", "plain"]);
        assert!(find(dir.path(), "custom", 2).is_ok());
        assert!(find(dir.path(), "plain", 3).is_ok());
        assert!(matches!(find(dir.path(), "typo", 2), Err(Error::ModelNotFound { .. })));
    }

    #[test]
    fn missing_param_file_is_not_a_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("realesrgan-x4plus.bin"), b"").unwrap();
        assert!(find(dir.path(), "realesrgan-x4plus", 4).is_err());
    }

    #[test]
    fn lists_bin_stems() {
        let dir = model_dir(&["realesrgan-x4plus", "realesr-animevideov3-x2"]);
        fs::write(dir.path().join("readme.txt"), b"").unwrap();
        assert_eq!(list(dir.path()).unwrap(), vec!["realesr-animevideov3-x2", "realesrgan-x4plus"]);
    }
}
