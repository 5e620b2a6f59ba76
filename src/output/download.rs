use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    error::{OutputError, Result},
    output::assembler::OutputArtifact,
};

/// Hands a finished artifact to the user as a file
///
/// The artifact is written to a temporary `.partial` file in the target
/// directory and renamed into place. The temporary file is removed on every
/// path that does not end in a successful rename.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    directory: PathBuf,
}

impl ArtifactWriter {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Write the artifact, returning the final path
    pub async fn save(&self, artifact: &OutputArtifact) -> Result<PathBuf> {
        let name = validate_filename(&artifact.suggested_filename)?;

        tokio::fs::create_dir_all(&self.directory).await?;

        let target = self.directory.join(name);
        let partial = PartialFile::new(self.directory.join(format!(".{}.partial", name)));

        tokio::fs::write(partial.path(), &artifact.bytes)
            .await
            .map_err(|e| OutputError::WriteFailed {
                path: partial.path().display().to_string(),
                reason: e.to_string(),
            })?;

        tokio::fs::rename(partial.path(), &target)
            .await
            .map_err(|e| OutputError::WriteFailed {
                path: target.display().to_string(),
                reason: e.to_string(),
            })?;
        partial.commit();

        info!(
            "Saved {} ({} bytes, {})",
            target.display(),
            artifact.len(),
            artifact.mime_type
        );
        Ok(target)
    }
}

fn validate_filename(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0');

    if valid {
        Ok(name)
    } else {
        Err(OutputError::InvalidFilename {
            name: name.to_string(),
        }
        .into())
    }
}

/// Temporary file that is removed on drop unless committed
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial artifact {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial artifact {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact(name: &str) -> OutputArtifact {
        OutputArtifact {
            bytes: b"\x00\x00\x00\x01payload".to_vec(),
            mime_type: "application/octet-stream".to_string(),
            suggested_filename: name.to_string(),
        }
    }

    fn leftover_partials(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .count()
    }

    #[tokio::test]
    async fn test_save_writes_file() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("out"));

        let path = writer.save(&artifact("encoded.h264")).await.unwrap();

        assert_eq!(path, dir.path().join("out").join("encoded.h264"));
        assert_eq!(std::fs::read(&path).unwrap(), b"\x00\x00\x00\x01payload");
        assert_eq!(leftover_partials(&dir.path().join("out")), 0);
    }

    #[tokio::test]
    async fn test_rejects_path_components() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        for name in ["", "..", "../video.mp4", "a/b.mp4"] {
            let err = writer.save(&artifact(name)).await.unwrap_err();
            assert!(matches!(
                err,
                crate::RecorderError::Output(OutputError::InvalidFilename { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_failed_rename_cleans_up_partial() {
        let dir = tempdir().unwrap();
        // A directory at the target path makes the rename fail
        std::fs::create_dir_all(dir.path().join("video.mp4").join("occupied")).unwrap();

        let writer = ArtifactWriter::new(dir.path());
        assert!(writer.save(&artifact("video.mp4")).await.is_err());
        assert_eq!(leftover_partials(dir.path()), 0);
    }
}
