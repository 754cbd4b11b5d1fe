//! OCI image references, registry access and local image layouts.
//!
//! - [`ImageReference`]: parsed `[registry/]repository(:tag|@digest)`
//! - [`Registry`]: the four registry operations the pipeline needs
//! - [`OciRegistry`]: `oci-distribution` implementation of [`Registry`]
//! - [`LocalImage`]: an image held on disk as an OCI layout

pub mod credentials;
mod layout;
pub mod reference;
pub mod registry;

pub use credentials::CredentialStore;
pub use layout::LocalImage;
pub use reference::{ImageReference, DEFAULT_REGISTRY};
pub use registry::{is_local_registry, OciRegistry, Registry, RegistryAuth};
