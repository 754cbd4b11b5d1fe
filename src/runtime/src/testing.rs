//! In-memory capability fakes for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secure_import_core::config::ImportConfig;
use secure_import_core::error::{ImportError, Result};

use crate::oci::{ImageReference, LocalImage, Registry};
use crate::tools::{ChartSource, Patcher, ScanReport, Scanner, Signer, ToolSet};

/// Write a minimal layout whose only blob is a one-byte manifest.
fn write_layout(dir: &Path) -> Result<LocalImage> {
    let blobs = dir.join("blobs").join("sha256");
    std::fs::create_dir_all(&blobs)?;
    std::fs::write(blobs.join("feed"), b"{}")?;
    LocalImage::write_index(dir, "sha256:feed", 2)
}

fn registry_failure(reference: &ImageReference, message: &str) -> ImportError {
    ImportError::RegistryError {
        registry: reference.registry_or_default().to_string(),
        message: format!("{}: {}", message, reference),
    }
}

/// Registry fake recording every call.
///
/// Pushed references start to exist, so digests resolve for them.
#[derive(Default)]
pub struct FakeRegistry {
    existing: Mutex<HashSet<String>>,
    failing_exists: Mutex<HashSet<String>>,
    failing_pulls: Mutex<HashSet<String>>,
    failing_pushes: Mutex<HashSet<String>>,
    failing_digests: Mutex<HashSet<String>>,
    exists_checks: Mutex<Vec<String>>,
    pulls: Mutex<Vec<String>>,
    pushes: Mutex<Vec<(String, String)>>,
    digest_lookups: Mutex<Vec<String>>,
    pull_delay: Option<Duration>,
    active_pulls: AtomicUsize,
    max_active_pulls: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each pull for `delay` so overlapping pipelines become visible.
    pub fn with_pull_delay(delay: Duration) -> Self {
        Self {
            pull_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn add_existing(&self, reference: &str) {
        self.existing.lock().unwrap().insert(reference.to_string());
    }

    pub fn fail_exists(&self, reference: &str) {
        self.failing_exists.lock().unwrap().insert(reference.to_string());
    }

    pub fn fail_pull(&self, reference: &str) {
        self.failing_pulls.lock().unwrap().insert(reference.to_string());
    }

    pub fn fail_push(&self, reference: &str) {
        self.failing_pushes.lock().unwrap().insert(reference.to_string());
    }

    pub fn fail_digest(&self, reference: &str) {
        self.failing_digests.lock().unwrap().insert(reference.to_string());
    }

    pub fn exists_checks(&self) -> Vec<String> {
        self.exists_checks.lock().unwrap().clone()
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().unwrap().clone()
    }

    /// `(layout directory name, target)` per push.
    pub fn pushes(&self) -> Vec<(String, String)> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn digest_lookups(&self) -> Vec<String> {
        self.digest_lookups.lock().unwrap().clone()
    }

    pub fn max_concurrent_pulls(&self) -> usize {
        self.max_active_pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn exists(&self, reference: &ImageReference) -> Result<bool> {
        let name = reference.to_string();
        self.exists_checks.lock().unwrap().push(name.clone());
        if self.failing_exists.lock().unwrap().contains(&name) {
            return Err(registry_failure(reference, "connection reset"));
        }
        Ok(self.existing.lock().unwrap().contains(&name))
    }

    async fn digest(&self, reference: &ImageReference) -> Result<String> {
        let name = reference.to_string();
        self.digest_lookups.lock().unwrap().push(name.clone());
        if self.failing_digests.lock().unwrap().contains(&name) {
            return Err(registry_failure(reference, "unauthorized"));
        }
        if !self.existing.lock().unwrap().contains(&name) {
            return Err(registry_failure(reference, "Manifest not found"));
        }
        Ok(format!("sha256:{:0>64}", name.len()))
    }

    async fn pull(&self, reference: &ImageReference, target_dir: &Path) -> Result<LocalImage> {
        let name = reference.to_string();
        self.pulls.lock().unwrap().push(name.clone());

        let active = self.active_pulls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_pulls.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.pull_delay {
            tokio::time::sleep(delay).await;
        }
        self.active_pulls.fetch_sub(1, Ordering::SeqCst);

        if self.failing_pulls.lock().unwrap().contains(&name) {
            return Err(registry_failure(reference, "manifest unknown"));
        }
        write_layout(target_dir)
    }

    async fn push(&self, image: &LocalImage, reference: &ImageReference) -> Result<()> {
        let name = reference.to_string();
        if self.failing_pushes.lock().unwrap().contains(&name) {
            return Err(registry_failure(reference, "denied"));
        }
        let layout = image
            .root_dir()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.pushes.lock().unwrap().push((layout, name.clone()));
        self.existing.lock().unwrap().insert(name);
        Ok(())
    }
}

/// Short form of a reference: the implicit `docker.io/` prefix removed.
fn short_name(reference: &ImageReference) -> String {
    let name = reference.to_string();
    name.strip_prefix("docker.io/")
        .map(str::to_string)
        .unwrap_or(name)
}

/// Scanner fake writing real report JSON with a scripted finding count.
#[derive(Default)]
pub struct FakeScanner {
    findings: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    scanned: Mutex<Vec<String>>,
}

impl FakeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_findings(&self, reference: &str, count: usize) {
        self.findings
            .lock()
            .unwrap()
            .insert(reference.to_string(), count);
    }

    /// Produce unparsable output for `reference`.
    pub fn fail_for(&self, reference: &str) {
        self.failing.lock().unwrap().insert(reference.to_string());
    }

    pub fn scanned(&self) -> Vec<String> {
        self.scanned.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.scanned.lock().unwrap().len()
    }
}

#[async_trait]
impl Scanner for FakeScanner {
    fn is_available(&self) -> bool {
        true
    }

    async fn scan(&self, reference: &ImageReference, output_file: &Path) -> Result<ScanReport> {
        let name = short_name(reference);
        self.scanned.lock().unwrap().push(name.clone());

        if self.failing.lock().unwrap().contains(&name) {
            std::fs::write(output_file, "trivy: fatal error")?;
            return ScanReport::from_file(output_file);
        }

        let count = self.findings.lock().unwrap().get(&name).copied().unwrap_or(0);
        let vulnerabilities: Vec<serde_json::Value> = (0..count)
            .map(|i| serde_json::json!({"VulnerabilityID": format!("CVE-2024-{:04}", i)}))
            .collect();
        let report = serde_json::json!({
            "Results": [{"Target": name, "Vulnerabilities": vulnerabilities}]
        });
        std::fs::write(output_file, report.to_string())?;
        ScanReport::from_file(output_file)
    }
}

/// Patcher fake producing a layout named `patched`.
#[derive(Default)]
pub struct FakePatcher {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl FakePatcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every later patch fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Patcher for FakePatcher {
    fn is_available(&self) -> bool {
        true
    }

    async fn patch(
        &self,
        report_file: &Path,
        _reference: &ImageReference,
        output_tag: &str,
        work_dir: &Path,
    ) -> Result<LocalImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(report_file.is_file(), "patcher needs the scan report");
        if self.failing.load(Ordering::SeqCst) {
            return Err(ImportError::ToolError {
                tool: "copa".to_string(),
                message: "exit 1: buildkit unreachable".to_string(),
            });
        }
        write_layout(&work_dir.join(output_tag))
    }
}

/// Signer fake recording `(key, target)` pairs.
#[derive(Default)]
pub struct RecordingSigner {
    signed: Mutex<Vec<(String, String)>>,
    failing_repositories: Mutex<HashSet<String>>,
}

impl RecordingSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to sign any target in `repository`.
    pub fn fail_for(&self, repository: &str) {
        self.failing_repositories
            .lock()
            .unwrap()
            .insert(repository.to_string());
    }

    pub fn signed(&self) -> Vec<(String, String)> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Signer for RecordingSigner {
    fn is_available(&self) -> bool {
        true
    }

    async fn sign(&self, key: &str, target: &ImageReference) -> Result<()> {
        if self
            .failing_repositories
            .lock()
            .unwrap()
            .contains(&target.repository)
        {
            return Err(ImportError::ToolError {
                tool: "cosign".to_string(),
                message: "exit 1: signing key is encrypted".to_string(),
            });
        }
        self.signed
            .lock()
            .unwrap()
            .push((key.to_string(), target.to_string()));
        Ok(())
    }
}

/// A full set of available fakes with handles kept for assertions.
pub struct FakeTools {
    pub scanner: Arc<FakeScanner>,
    pub patcher: Arc<FakePatcher>,
    pub signer: Arc<RecordingSigner>,
}

impl FakeTools {
    pub fn all_available() -> Self {
        Self {
            scanner: Arc::new(FakeScanner::new()),
            patcher: Arc::new(FakePatcher::default()),
            signer: Arc::new(RecordingSigner::new()),
        }
    }

    pub fn tool_set(&self) -> ToolSet {
        ToolSet {
            scanner: self.scanner.clone(),
            patcher: self.patcher.clone(),
            signer: self.signer.clone(),
        }
    }
}

/// Chart source fake serving a fixed rendered stream.
#[derive(Default)]
pub struct FakeChartSource {
    rendered: String,
    fail_pull: bool,
    published: Option<(Arc<FakeRegistry>, String)>,
    pushed: Mutex<Vec<(PathBuf, String)>>,
    rendered_with: Mutex<Vec<Option<PathBuf>>>,
}

impl FakeChartSource {
    pub fn rendering(rendered: &str) -> Self {
        Self {
            rendered: rendered.to_string(),
            ..Self::default()
        }
    }

    /// Make pushes visible in `registry` as `reference`.
    pub fn publishing_to(mut self, registry: Arc<FakeRegistry>, reference: &str) -> Self {
        self.published = Some((registry, reference.to_string()));
        self
    }

    pub fn failing_pull() -> Self {
        Self {
            fail_pull: true,
            ..Self::default()
        }
    }

    pub fn pushed(&self) -> Vec<(PathBuf, String)> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn rendered_with(&self) -> Vec<Option<PathBuf>> {
        self.rendered_with.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChartSource for FakeChartSource {
    async fn pull(&self, config: &ImportConfig, dest_dir: &Path) -> Result<PathBuf> {
        if self.fail_pull {
            return Err(ImportError::ToolError {
                tool: "helm".to_string(),
                message: "exit 1: chart not found".to_string(),
            });
        }
        let archive = dest_dir.join(config.chart_file());
        std::fs::write(&archive, b"chart")?;
        Ok(archive)
    }

    async fn render(&self, archive: &Path, values: Option<&Path>) -> Result<String> {
        assert!(archive.is_file(), "render needs the pulled archive");
        self.rendered_with
            .lock()
            .unwrap()
            .push(values.map(Path::to_path_buf));
        Ok(self.rendered.clone())
    }

    async fn push(&self, archive: &Path, registry: &str) -> Result<()> {
        self.pushed
            .lock()
            .unwrap()
            .push((archive.to_path_buf(), registry.to_string()));
        if let Some((fake, reference)) = &self.published {
            fake.add_existing(reference);
        }
        Ok(())
    }
}
