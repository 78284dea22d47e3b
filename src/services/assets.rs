//! Workspace asset lookup: flows, queries and scripts under each root.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use super::ServiceError;

/// Namespace of the home root.
pub const SYSTEM_NAMESPACE: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Flow,
    Query,
    Script,
}

impl AssetKind {
    fn dir(self) -> &'static str {
        match self {
            AssetKind::Flow => "flows",
            AssetKind::Query => "queries",
            AssetKind::Script => "scripts",
        }
    }

    /// Suffix stripped from file names to form asset names. Scripts keep
    /// their full file name.
    fn suffix(self) -> Option<&'static str> {
        match self {
            AssetKind::Flow => Some(".flow.yaml"),
            AssetKind::Query => Some(".sql"),
            AssetKind::Script => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Flow => "flow",
            AssetKind::Query => "query",
            AssetKind::Script => "script",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub namespace: String,
    pub name: String,
    pub path: PathBuf,
}

/// One asset root. Assets under it are addressed as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Root {
    pub namespace: String,
    pub path: PathBuf,
}

impl Root {
    fn at(path: PathBuf) -> Self {
        let namespace = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { namespace, path }
    }

    pub fn is_system(&self) -> bool {
        self.namespace == SYSTEM_NAMESPACE
    }
}

/// Ordered asset roots: home first (`system`), then configured roots.
///
/// Clones share the same root list, so `workspace add` is seen by every
/// holder of the services.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    roots: Arc<RwLock<Vec<Root>>>,
}

impl Workspace {
    pub fn new(home: &Path, extra: &[PathBuf]) -> Self {
        let mut roots = vec![Root {
            namespace: SYSTEM_NAMESPACE.into(),
            path: home.to_path_buf(),
        }];
        roots.extend(extra.iter().cloned().map(Root::at));
        Self {
            roots: Arc::new(RwLock::new(roots)),
        }
    }

    /// The current roots, system root first.
    pub fn roots(&self) -> Vec<Root> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a directory as a new root. The path is canonicalized and
    /// its final component becomes the namespace, which must be unused.
    pub async fn add_root(&self, path: &Path) -> Result<Root, ServiceError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| ServiceError::NotFound(format!("directory '{}'", path.display())))?;
        if !meta.is_dir() {
            return Err(ServiceError::Failed(format!(
                "'{}' is not a directory",
                path.display()
            )));
        }
        let root = Root::at(tokio::fs::canonicalize(path).await?);

        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = roots
            .iter()
            .find(|r| r.path == root.path || r.namespace == root.namespace)
        {
            return Err(ServiceError::Failed(format!(
                "'{}' is already registered as '{}'",
                existing.path.display(),
                existing.namespace
            )));
        }
        roots.push(root.clone());
        Ok(root)
    }

    /// Unregister a root by namespace or path. The system root stays.
    pub async fn remove_root(&self, reference: &str) -> Result<Root, ServiceError> {
        let canonical = tokio::fs::canonicalize(reference).await.ok();
        let mut roots = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        let Some(index) = roots.iter().position(|r| {
            r.namespace == reference
                || r.path == Path::new(reference)
                || canonical.as_deref() == Some(r.path.as_path())
        }) else {
            return Err(ServiceError::NotFound(format!("workspace root '{reference}'")));
        };
        if roots[index].is_system() {
            return Err(ServiceError::Failed("the system root cannot be removed".into()));
        }
        Ok(roots.remove(index))
    }

    /// Every asset of `kind`, by root order then name.
    pub async fn list(&self, kind: AssetKind) -> Vec<Asset> {
        let mut assets = Vec::new();
        for root in self.roots() {
            assets.extend(list_root(&root, kind).await);
        }
        assets
    }

    /// Resolve a reference: an explicit path, `namespace/name`, or a bare
    /// name searched across roots in order.
    pub async fn find(&self, kind: AssetKind, reference: &str) -> Result<Asset, ServiceError> {
        let not_found = || ServiceError::NotFound(format!("{} '{reference}'", kind.label()));

        if reference.starts_with('/') || reference.starts_with("./") || reference.starts_with("../")
        {
            let path = PathBuf::from(reference);
            if !is_file(&path).await {
                return Err(not_found());
            }
            return Ok(Asset {
                namespace: String::new(),
                name: asset_name(&path, kind).unwrap_or_else(|| reference.to_string()),
                path,
            });
        }

        let (namespace, name) = match reference.split_once('/') {
            Some((ns, name)) => (Some(ns), name),
            None => (None, reference),
        };

        for root in self.roots() {
            if namespace.is_some_and(|ns| ns != root.namespace) {
                continue;
            }
            if let Some(asset) = list_root(&root, kind)
                .await
                .into_iter()
                .find(|asset| matches_name(asset, name))
            {
                return Ok(asset);
            }
        }
        Err(not_found())
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

fn matches_name(asset: &Asset, name: &str) -> bool {
    if asset.name == name {
        return true;
    }
    // Scripts may be referenced without their extension.
    asset
        .path
        .file_stem()
        .is_some_and(|stem| stem.to_string_lossy() == name)
}

fn asset_name(path: &Path, kind: AssetKind) -> Option<String> {
    let file = path.file_name()?.to_string_lossy().into_owned();
    match kind.suffix() {
        Some(suffix) => file.strip_suffix(suffix).map(String::from),
        None => Some(file),
    }
}

async fn list_root(root: &Root, kind: AssetKind) -> Vec<Asset> {
    let Ok(mut entries) = tokio::fs::read_dir(root.path.join(kind.dir())).await else {
        return Vec::new();
    };
    let mut assets = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !is_file(&path).await {
            continue;
        }
        let Some(name) = asset_name(&path, kind) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        assets.push(Asset {
            namespace: root.namespace.clone(),
            name,
            path,
        });
    }
    assets.sort_by(|a, b| a.name.cmp(&b.name));
    assets
}
