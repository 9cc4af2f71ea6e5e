//! Person registry: one directory per identity under the face-data root.
//!
//! Directory names are normalized keys: the trimmed name with each run of
//! whitespace collapsed to a single `_`. Listing reverses that, so
//! `"Ann Lee"` is stored as `Ann_Lee/` and listed as `"Ann Lee"`.

use crate::error::ValidationError;
use crate::types::Frame;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KEY_SEPARATOR: &str = "_";
const SAMPLE_PREFIX: &str = "face_";
const SAMPLE_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("registry i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("frame is {width}x{height} but holds {len} bytes")]
    FrameSize { width: u32, height: u32, len: usize },
    #[error("failed to encode reference image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A registered person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Display name, as listed and as written to the ledger.
    pub name: String,
    /// Normalized storage key (directory name).
    pub key: String,
    /// Directory holding this identity's reference images.
    pub dir: PathBuf,
}

/// Normalize a user-supplied name into a directory key.
pub fn normalize_key(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let key = trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR);
    if key.contains(['/', '\\']) || key.contains(char::is_control) || key == "." || key == ".." {
        return Err(ValidationError::InvalidName(trimmed.to_string()));
    }
    Ok(key)
}

/// Reverse a storage key into its display name.
pub fn display_name(key: &str) -> String {
    key.replace(KEY_SEPARATOR, " ")
}

/// Directory-backed identity store.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it is missing.
    pub fn initialize(&self) -> Result<(), RegistryError> {
        if !self.root.is_dir() {
            fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
            tracing::info!(root = %self.root.display(), "created face data directory");
        }
        Ok(())
    }

    /// Register `name`, creating its directory if needed.
    ///
    /// Re-registering an existing name reuses its directory, so more
    /// reference images can be added later.
    pub fn register(&self, name: &str) -> Result<Identity, RegistryError> {
        let key = normalize_key(name)?;
        self.initialize()?;

        let dir = self.root.join(&key);
        if dir.is_dir() {
            tracing::info!(key = %key, "identity already registered; reusing directory");
        } else {
            fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            tracing::info!(key = %key, "registered identity");
        }

        Ok(Identity {
            name: display_name(&key),
            key,
            dir,
        })
    }

    /// Display names of every registered identity, sorted.
    ///
    /// A missing root lists as empty.
    pub fn list(&self) -> Result<Vec<String>, RegistryError> {
        Ok(self
            .identities()?
            .into_iter()
            .map(|identity| identity.name)
            .collect())
    }

    /// Every registered identity, sorted by display name.
    pub fn identities(&self) -> Result<Vec<Identity>, RegistryError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.root, e)),
        };

        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %path.display(), "skipping non-UTF-8 identity directory");
                continue;
            };
            identities.push(Identity {
                name: display_name(&key),
                key,
                dir: path,
            });
        }
        identities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(identities)
    }

    pub fn has_any(&self) -> Result<bool, RegistryError> {
        Ok(!self.identities()?.is_empty())
    }

    /// Reference images stored for `identity`, in index order.
    pub fn reference_images(&self, identity: &Identity) -> Result<Vec<PathBuf>, RegistryError> {
        let mut indexed = sample_indices(&identity.dir)?;
        indexed.sort_by_key(|(idx, _)| *idx);
        Ok(indexed.into_iter().map(|(_, path)| path).collect())
    }

    /// Persist `frame` as the next reference image for `identity`.
    ///
    /// Images are named `face_<n>.jpg`, continuing after the highest index
    /// already on disk.
    pub fn save_reference(&self, identity: &Identity, frame: &Frame) -> Result<PathBuf, RegistryError> {
        let image = frame.to_image().ok_or(RegistryError::FrameSize {
            width: frame.width,
            height: frame.height,
            len: frame.data.len(),
        })?;

        fs::create_dir_all(&identity.dir).map_err(|e| io_err(&identity.dir, e))?;
        let next = sample_indices(&identity.dir)?
            .iter()
            .map(|(idx, _)| idx + 1)
            .max()
            .unwrap_or(0);
        let path = identity
            .dir
            .join(format!("{SAMPLE_PREFIX}{next}.{SAMPLE_EXTENSION}"));

        image.save(&path).map_err(|source| RegistryError::Encode {
            path: path.clone(),
            source,
        })?;
        tracing::info!(key = %identity.key, path = %path.display(), "saved reference image");
        Ok(path)
    }
}

fn sample_indices(dir: &Path) -> Result<Vec<(u32, PathBuf)>, RegistryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(dir, e)),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let file_name = entry.file_name();
        let Some(index) = file_name
            .to_str()
            .and_then(|n| n.strip_prefix(SAMPLE_PREFIX))
            .and_then(|n| n.strip_suffix(SAMPLE_EXTENSION))
            .and_then(|n| n.strip_suffix('.'))
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };
        found.push((index, entry.path()));
    }
    Ok(found)
}

fn io_err(path: &Path, source: io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.to_path_buf(),
        source,
    }
}
