//! Removal or archiving of per-date artifacts.

use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Disposes of the local files a run produced. Never fails the run.
pub trait ArtifactCleaner: Send + Sync {
    fn cleanup(&self, artifacts: &[PathBuf]);
}

/// Deletes every artifact.
pub struct RemoveArtifacts;

impl ArtifactCleaner for RemoveArtifacts {
    fn cleanup(&self, artifacts: &[PathBuf]) {
        for path in artifacts {
            remove(path);
        }
    }
}

/// Moves MP3 artifacts into an archive directory and deletes the rest.
pub struct ArchiveArtifacts {
    archive_dir: PathBuf,
}

impl ArchiveArtifacts {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    fn archive(&self, path: &Path) {
        let Some(name) = path.file_name() else {
            return;
        };
        if let Err(e) = fs::create_dir_all(&self.archive_dir) {
            warn!("Could not create archive {}: {}", self.archive_dir.display(), e);
            return;
        }

        let target = self.archive_dir.join(name);
        if target == path {
            return;
        }
        // rename fails across filesystems
        let moved = fs::rename(path, &target)
            .or_else(|_| fs::copy(path, &target).and_then(|_| fs::remove_file(path)));
        match moved {
            Ok(()) => info!("Archived {}", target.display()),
            Err(e) => warn!("Could not archive {}: {}", path.display(), e),
        }
    }
}

impl ArtifactCleaner for ArchiveArtifacts {
    fn cleanup(&self, artifacts: &[PathBuf]) {
        for path in artifacts {
            if !path.exists() {
                continue;
            }
            let is_mp3 = path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("mp3"));
            if is_mp3 {
                self.archive(path);
            } else {
                remove(path);
            }
        }
    }
}

fn remove(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove temporary file {}: {}", path.display(), e),
    }
}
