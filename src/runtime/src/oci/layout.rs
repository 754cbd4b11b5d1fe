//! Local OCI image layouts.
//!
//! Pulled and patched images live on disk as OCI image layouts:
//!
//! ```text
//! image/
//! ├── oci-layout           (layout marker)
//! ├── index.json           (points at the manifest)
//! └── blobs/sha256/        (manifest, config, layers)
//! ```

use std::path::{Path, PathBuf};

use secure_import_core::error::{ImportError, Result};

/// An image stored as an OCI layout directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    root_dir: PathBuf,
}

impl LocalImage {
    /// Open an existing layout, checking that `index.json` is present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root_dir = path.as_ref().to_path_buf();
        if !root_dir.join("index.json").is_file() {
            return Err(ImportError::OciImageError(format!(
                "Not an OCI image layout (missing index.json): {}",
                root_dir.display()
            )));
        }
        Ok(Self { root_dir })
    }

    /// Unpack a `docker save` / OCI tar archive into `target_dir` and open it.
    pub fn from_archive(archive_path: &Path, target_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(target_dir)?;
        let file = std::fs::File::open(archive_path).map_err(|e| {
            ImportError::OciImageError(format!(
                "Failed to open image archive {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        let mut archive = tar::Archive::new(file);
        archive.unpack(target_dir).map_err(|e| {
            ImportError::OciImageError(format!("Failed to extract image archive: {}", e))
        })?;
        Self::open(target_dir)
    }

    /// Root directory of the layout.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory holding `sha256` blobs.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root_dir.join("blobs").join("sha256")
    }

    /// Digest of the first manifest listed in `index.json`.
    pub fn manifest_digest(&self) -> Result<String> {
        let index_data = std::fs::read_to_string(self.root_dir.join("index.json")).map_err(|e| {
            ImportError::OciImageError(format!("Failed to read index.json: {}", e))
        })?;
        let index: serde_json::Value = serde_json::from_str(&index_data)?;
        index["manifests"][0]["digest"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ImportError::OciImageError("No manifest digest in index.json".to_string())
            })
    }

    /// Read a blob by digest (`sha256:<hex>` or bare hex).
    pub fn read_blob(&self, digest: &str) -> Result<Vec<u8>> {
        let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
        std::fs::read(self.blobs_dir().join(hex)).map_err(|e| {
            ImportError::OciImageError(format!("Failed to read blob {}: {}", digest, e))
        })
    }

    /// Write a layout skeleton for a manifest whose blobs are already in `blobs_dir`.
    pub(crate) fn write_index(
        target_dir: &Path,
        manifest_digest: &str,
        manifest_size: usize,
    ) -> Result<Self> {
        std::fs::write(
            target_dir.join("oci-layout"),
            r#"{"imageLayoutVersion":"1.0.0"}"#,
        )?;
        let index = serde_json::json!({
            "schemaVersion": 2,
            "manifests": [{
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": manifest_digest,
                "size": manifest_size
            }]
        });
        std::fs::write(
            target_dir.join("index.json"),
            serde_json::to_string_pretty(&index)?,
        )?;
        Self::open(target_dir)
    }
}
