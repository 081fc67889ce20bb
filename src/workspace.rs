//! Scratch workspace for chunk datasets
//!
//! The scratch root is wiped and recreated on every run. Before wiping, the guard refuses
//! any root that would take the inputs or the report with it: the filesystem root, the
//! working directory, or any ancestor of an input/output path.
//!
//! Chunks are left in place after the run for inspection.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// One input's on-disk chunk directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub name: String,
    pub dir: PathBuf,
}

/// Absolute, lexically normalized form of `path` (no filesystem access, so it also works
/// for paths that do not exist yet)
fn absolutize(path: &Path) -> Result<PathBuf> {
    let base = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().map_err(|e| PipelineError::io(".", e))?
    };
    let mut out = PathBuf::new();
    for component in base.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

/// `absolutize`, then follow symlinks through the deepest ancestor that exists
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = absolutize(path)?;
    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(rest.iter().rev());
                return Ok(resolved);
            }
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    rest.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Ok(absolute),
            },
        }
    }
}

/// Resolved location of the directory entry itself (a symlinked file stays a link)
fn resolve_entry(path: &Path) -> Result<PathBuf> {
    let absolute = absolutize(path)?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => Ok(resolve(parent)?.join(name)),
        _ => Ok(absolute),
    }
}

/// Refuse to wipe `temp_dir` if it is `/`, the working directory, or contains any of
/// `protected`
pub fn validate_wipe_target(temp_dir: &Path, protected: &[&Path]) -> Result<()> {
    let target = resolve(temp_dir)?;

    if target.parent().is_none() {
        return Err(PipelineError::UnsafeWipe {
            path: temp_dir.to_path_buf(),
            reason: "it is a filesystem root".to_string(),
        });
    }
    let cwd = resolve(Path::new("."))?;
    if cwd.starts_with(&target) {
        return Err(PipelineError::UnsafeWipe {
            path: temp_dir.to_path_buf(),
            reason: "it contains the working directory".to_string(),
        });
    }
    for path in protected {
        if resolve_entry(path)?.starts_with(&target) || resolve(path)?.starts_with(&target) {
            return Err(PipelineError::UnsafeWipe {
                path: temp_dir.to_path_buf(),
                reason: format!("it contains {}", path.display()),
            });
        }
    }
    Ok(())
}

/// Dataset directory names for both inputs: their file stems, with `_2` appended to the
/// right one when the stems collide
pub fn dataset_names(config: &PipelineConfig) -> (String, String) {
    let left = config.left.stem();
    let mut right = config.right.stem();
    if right == left {
        right.push_str("_2");
    }
    (left, right)
}

/// Wipe (or create) the scratch root and create both dataset directories
pub fn prepare(config: &PipelineConfig) -> Result<(Dataset, Dataset)> {
    let temp_dir = &config.temp_dir;
    let mut protected = vec![
        config.left.path.as_path(),
        config.right.path.as_path(),
        config.report_path.as_path(),
    ];
    if let Some(json) = &config.json_report_path {
        protected.push(json.as_path());
    }
    validate_wipe_target(temp_dir, &protected)?;

    if temp_dir.is_dir() {
        info!("wiping scratch directory {}", temp_dir.display());
        std::fs::remove_dir_all(temp_dir).map_err(|e| PipelineError::io(temp_dir, e))?;
    } else if temp_dir.exists() {
        return Err(PipelineError::storage(
            temp_dir,
            "scratch path exists and is not a directory",
        ));
    }

    let (left_name, right_name) = dataset_names(config);
    let create = |name: String| -> Result<Dataset> {
        let dir = temp_dir.join(&name);
        std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
        Ok(Dataset { name, dir })
    };
    Ok((create(left_name)?, create(right_name)?))
}
