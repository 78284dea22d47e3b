use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use super::{ServiceError, SnapshotStore};
use crate::value::is_identifier;

/// Stores each snapshot as pretty JSON in `<dir>/<name>.json`.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, ServiceError> {
        if !is_identifier(name) {
            return Err(ServiceError::Failed(format!(
                "invalid session name '{name}' (letters, digits, '_' and '-' only)"
            )));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }
}

fn not_found(name: &str) -> ServiceError {
    ServiceError::NotFound(format!("session '{name}'"))
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, name: &str, doc: &Value) -> Result<(), ServiceError> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let text = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&path, text).await?;
        log::info!("saved session snapshot {}", path.display());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Value, ServiceError> {
        let path = self.path_for(name)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found(name)),
            Err(e) => return Err(e.into()),
        };
        log::info!("loaded session snapshot {}", path.display());
        Ok(serde_json::from_str(&text)?)
    }

    async fn list(&self) -> Result<Vec<String>, ServiceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn remove(&self, name: &str) -> Result<(), ServiceError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found(name)),
            Err(e) => Err(e.into()),
        }
    }
}
