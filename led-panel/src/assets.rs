use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{FRAME_BYTES, FRAME_EXTENSIONS};

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Images and animations the panel can show, by name
#[derive(Debug, Default, Clone)]
pub struct FrameLibrary {
    images: HashMap<String, Vec<u8>>,
    animations: HashMap<String, Vec<Vec<u8>>>,
}

impl FrameLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `dir`: top-level frame files are images, each sub-directory is
    /// an animation whose frames are ordered by the first number in their name.
    pub fn load_dir(dir: &Path) -> Result<Self, AssetError> {
        if !dir.is_dir() {
            return Err(AssetError::NotADirectory { path: dir.to_path_buf() });
        }

        let mut library = Self::new();
        for entry in read_dir(dir)? {
            if entry.is_dir() {
                let Some(name) = file_name(&entry) else { continue };
                let mut frames = Vec::new();
                for frame in read_dir(&entry)? {
                    if is_frame_file(&frame) {
                        frames.push(frame);
                    }
                }
                // Кадры сортируются по первому числу в имени
                frames.sort_by_key(|path| (frame_number(path), path.clone()));
                let frames = frames.iter().map(|path| read_frame(path)).collect::<Result<Vec<_>, _>>()?;
                if frames.is_empty() {
                    warn!("Animation folder {} has no frames", entry.display());
                    continue;
                }
                debug!(animation = name.as_str(), frames = frames.len(), "animation loaded");
                library.animations.insert(name, frames);
            } else if is_frame_file(&entry) {
                let Some(name) = file_name(&entry) else { continue };
                let data = read_frame(&entry)?;
                library.images.insert(name, data);
            } else {
                debug!("Skipping {}: not a frame file", entry.display());
            }
        }

        info!(
            images = library.images.len(),
            animations = library.animations.len(),
            "assets loaded from {}",
            dir.display()
        );
        Ok(library)
    }

    pub fn insert_image(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.images.insert(name.into(), data);
    }

    pub fn insert_animation(&mut self, name: impl Into<String>, frames: Vec<Vec<u8>>) {
        self.animations.insert(name.into(), frames);
    }

    pub fn image(&self, name: &str) -> Option<&[u8]> {
        self.images.get(name).map(Vec::as_slice)
    }

    pub fn frame(&self, animation: &str, index: usize) -> Option<&[u8]> {
        self.animations.get(animation)?.get(index).map(Vec::as_slice)
    }

    pub fn frame_count(&self, animation: &str) -> usize {
        self.animations.get(animation).map_or(0, Vec::len)
    }

    pub fn image_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.images.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn animation_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.animations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, AssetError> {
    let io = |source| AssetError::Io { path: dir.to_path_buf(), source };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        paths.push(entry.map_err(io)?.path());
    }
    paths.sort();
    Ok(paths)
}

fn read_frame(path: &Path) -> Result<Vec<u8>, AssetError> {
    let data = fs::read(path).map_err(|source| AssetError::Io { path: path.to_path_buf(), source })?;
    if data.len() != FRAME_BYTES {
        // Загружаем всё равно: на панели будет картинка ошибки
        warn!(
            "{} is {} bytes, expected {FRAME_BYTES} for a 32x24 1-bit image",
            path.display(),
            data.len()
        );
    }
    Ok(data)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_string)
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// First run of digits in the file name; names without digits sort first
fn frame_number(path: &Path) -> u64 {
    let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
    name.chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}
