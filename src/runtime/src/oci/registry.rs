//! Registry capability and its OCI distribution client.
//!
//! The import pipeline only needs four registry operations: existence
//! check, digest lookup, pull into a local layout and push from one.
//! [`OciRegistry`] implements them with the `oci-distribution` crate.

use std::path::Path;

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::manifest::{ImageIndexEntry, OciImageManifest};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};
use secure_import_core::error::{ImportError, Result};

use super::credentials::CredentialStore;
use super::layout::LocalImage;
use super::reference::ImageReference;

/// The registry operations the import pipeline depends on.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Whether `reference` resolves to a manifest. "Not found" is `Ok(false)`.
    async fn exists(&self, reference: &ImageReference) -> Result<bool>;

    /// Manifest digest of `reference`.
    async fn digest(&self, reference: &ImageReference) -> Result<String>;

    /// Pull `reference` into an OCI layout at `target_dir`.
    async fn pull(&self, reference: &ImageReference, target_dir: &Path) -> Result<LocalImage>;

    /// Push a local layout to `reference`.
    async fn push(&self, image: &LocalImage, reference: &ImageReference) -> Result<()>;
}

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from environment variables.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`.
    /// Falls back to anonymous if not set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    /// Resolve credentials from the Docker config, falling back to env vars,
    /// then anonymous.
    pub fn from_credential_store(registry: &str) -> Self {
        if let Ok(store) = CredentialStore::default_path() {
            match store.get(registry) {
                Ok(Some((username, password))) => return Self::basic(username, password),
                Ok(None) => {}
                Err(e) => tracing::warn!(registry, error = %e, "Ignoring unreadable credential store"),
            }
        }
        Self::from_env()
    }

    /// Convert to oci-distribution auth type.
    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Registry client backed by `oci-distribution`.
///
/// Credentials are resolved per registry host on every call, so one client
/// serves both the source registries and the destination.
pub struct OciRegistry {
    client: Client,
}

impl OciRegistry {
    /// Create a client speaking HTTPS except to the given plain-HTTP registries.
    pub fn new(insecure_registries: Vec<String>) -> Self {
        let protocol = if insecure_registries.is_empty() {
            ClientProtocol::Https
        } else {
            ClientProtocol::HttpsExcept(insecure_registries)
        };
        let config = ClientConfig {
            protocol,
            platform_resolver: Some(Box::new(linux_platform_resolver)),
            ..Default::default()
        };
        Self {
            client: Client::new(config),
        }
    }

    /// Create a client for `target_registry`, reached over plain HTTP when it is local.
    pub fn for_target(target_registry: &str) -> Self {
        let insecure = if is_local_registry(target_registry) {
            vec![target_registry.to_string()]
        } else {
            Vec::new()
        };
        Self::new(insecure)
    }

    fn auth_for(&self, reference: &ImageReference) -> RegistryAuth {
        RegistryAuth::from_credential_store(reference.registry_or_default())
    }

    fn registry_error(reference: &ImageReference, message: String) -> ImportError {
        ImportError::RegistryError {
            registry: reference.registry_or_default().to_string(),
            message,
        }
    }

    /// Manifest digest of `reference`, or `None` when the registry reports it missing.
    async fn lookup_digest(&self, reference: &ImageReference) -> Result<Option<String>> {
        let oci_ref = to_oci_reference(reference)?;
        let auth = self.auth_for(reference).to_oci_auth();

        self.client
            .auth(&oci_ref, &auth, RegistryOperation::Pull)
            .await
            .map_err(|e| Self::registry_error(reference, format!("Authentication failed: {}", e)))?;

        match self.client.fetch_manifest_digest(&oci_ref, &auth).await {
            Ok(digest) => Ok(Some(digest)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Self::registry_error(
                reference,
                format!("Failed to fetch digest: {}", e),
            )),
        }
    }

    /// Pull config and layers for an image manifest, writing blobs to disk.
    async fn pull_image_content(
        &self,
        oci_ref: &Reference,
        manifest: &OciImageManifest,
        blobs_dir: &Path,
        reference: &ImageReference,
    ) -> Result<()> {
        let mut descriptors = vec![&manifest.config];
        descriptors.extend(manifest.layers.iter());

        for descriptor in descriptors {
            tracing::debug!(
                digest = %descriptor.digest,
                size = descriptor.size,
                "Pulling blob"
            );

            let mut data: Vec<u8> = Vec::new();
            self.client
                .pull_blob(oci_ref, descriptor, &mut data)
                .await
                .map_err(|e| {
                    Self::registry_error(
                        reference,
                        format!("Failed to pull blob {}: {}", descriptor.digest, e),
                    )
                })?;

            let hex = descriptor
                .digest
                .strip_prefix("sha256:")
                .unwrap_or(&descriptor.digest);
            std::fs::write(blobs_dir.join(hex), &data).map_err(|e| {
                Self::registry_error(reference, format!("Failed to write blob: {}", e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl Registry for OciRegistry {
    async fn exists(&self, reference: &ImageReference) -> Result<bool> {
        Ok(self.lookup_digest(reference).await?.is_some())
    }

    async fn digest(&self, reference: &ImageReference) -> Result<String> {
        self.lookup_digest(reference)
            .await?
            .ok_or_else(|| Self::registry_error(reference, format!("Manifest not found: {}", reference)))
    }

    async fn pull(&self, reference: &ImageReference, target_dir: &Path) -> Result<LocalImage> {
        let oci_ref = to_oci_reference(reference)?;

        tracing::info!(
            reference = %reference,
            target = %target_dir.display(),
            "Pulling image from registry"
        );

        let blobs_dir = target_dir.join("blobs").join("sha256");
        std::fs::create_dir_all(&blobs_dir).map_err(|e| {
            Self::registry_error(reference, format!("Failed to create blobs directory: {}", e))
        })?;

        // Resolves multi-arch image indexes to the linux platform
        let auth = self.auth_for(reference).to_oci_auth();
        let (image_manifest, manifest_digest) = self
            .client
            .pull_image_manifest(&oci_ref, &auth)
            .await
            .map_err(|e| Self::registry_error(reference, format!("Failed to pull manifest: {}", e)))?;

        let manifest_json = serde_json::to_vec(&image_manifest)?;
        let manifest_hex = manifest_digest
            .strip_prefix("sha256:")
            .unwrap_or(&manifest_digest);
        std::fs::write(blobs_dir.join(manifest_hex), &manifest_json).map_err(|e| {
            Self::registry_error(reference, format!("Failed to write manifest: {}", e))
        })?;

        self.pull_image_content(&oci_ref, &image_manifest, &blobs_dir, reference)
            .await?;

        let image = LocalImage::write_index(target_dir, &manifest_digest, manifest_json.len())?;

        tracing::info!(
            reference = %reference,
            digest = %manifest_digest,
            "Image pulled"
        );

        Ok(image)
    }

    async fn push(&self, image: &LocalImage, reference: &ImageReference) -> Result<()> {
        let oci_ref = to_oci_reference(reference)?;

        tracing::info!(
            reference = %reference,
            source = %image.root_dir().display(),
            "Pushing image to registry"
        );

        let manifest_digest = image.manifest_digest()?;
        let manifest: OciImageManifest = serde_json::from_slice(&image.read_blob(&manifest_digest)?)?;

        let config = Config::new(
            image.read_blob(&manifest.config.digest)?,
            manifest.config.media_type.clone(),
            None,
        );

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for layer_desc in &manifest.layers {
            let data = image.read_blob(&layer_desc.digest)?;
            tracing::debug!(
                digest = %layer_desc.digest,
                size = data.len(),
                "Read layer for push"
            );
            layers.push(ImageLayer::new(data, layer_desc.media_type.clone(), None));
        }

        let auth = self.auth_for(reference).to_oci_auth();
        let response = self
            .client
            .push(&oci_ref, &layers, config, &auth, Some(manifest))
            .await
            .map_err(|e| Self::registry_error(reference, format!("Failed to push image: {}", e)))?;

        tracing::info!(
            reference = %reference,
            manifest_url = %response.manifest_url,
            "Image pushed"
        );

        Ok(())
    }
}

/// Whether an oci-distribution error means the manifest does not exist.
fn is_not_found(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::ServerError { code, .. } => *code == 404,
        OciDistributionError::RegistryError { envelope, .. } => envelope.errors.iter().any(|e| {
            matches!(
                e.code,
                OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown
            )
        }),
        _ => false,
    }
}

/// Registries reached over plain HTTP.
pub fn is_local_registry(registry: &str) -> bool {
    registry == "localhost"
        || registry.starts_with("localhost:")
        || registry.starts_with("127.0.0.1")
}

/// Convert an ImageReference to an oci-distribution Reference.
fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
    let ref_str = reference.source().full_reference();
    ref_str.parse::<Reference>().map_err(|e| {
        ImportError::OciImageError(format!("Invalid OCI reference '{}': {}", ref_str, e))
    })
}

/// Platform resolver that selects linux images matching the host architecture.
fn linux_platform_resolver(manifests: &[ImageIndexEntry]) -> Option<String> {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };

    manifests
        .iter()
        .find(|entry| {
            entry
                .platform
                .as_ref()
                .is_some_and(|p| p.os == "linux" && p.architecture == arch)
        })
        .map(|entry| entry.digest.clone())
}
