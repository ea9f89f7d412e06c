use crate::error::AppError;
use crate::script::model::Script;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{error, info, instrument};

/// Holds the currently loaded script.
///
/// Cloning the store is cheap and every clone sees the same script. A reload
/// swaps the whole `Arc<Script>` at once, so readers either see the old script
/// or the new one, never a mix. A failed reload keeps the previous script.
#[derive(Debug, Clone)]
pub struct ScriptStore {
    path: PathBuf,
    current: Arc<RwLock<Option<Arc<Script>>>>,
}

impl ScriptStore {
    /// Creates an empty store bound to a definition file. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a store pre-populated with an already built script.
    pub fn with_script(path: impl Into<PathBuf>, script: Script) -> Self {
        let store = Self::new(path);
        store.replace(script);
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the definition file, then swaps it in.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Arc<Script>, AppError> {
        let source = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!("Failed to read script: {}", e);
            AppError::ScriptLoad(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let script = Script::from_json(&source).inspect_err(|e| error!("Invalid script: {}", e))?;
        info!(steps = script.steps().len(), "Script loaded");
        Ok(self.replace(script))
    }

    fn replace(&self, script: Script) -> Arc<Script> {
        let script = Arc::new(script);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::clone(&script));
        script
    }

    /// The loaded script, if any.
    pub fn snapshot(&self) -> Option<Arc<Script>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The loaded script, or `ScriptLoad` when nothing has loaded successfully yet.
    pub fn current(&self) -> Result<Arc<Script>, AppError> {
        self.snapshot()
            .ok_or_else(|| AppError::ScriptLoad("no script loaded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_success_then_failed_reload_keeps_previous() {
        let file = write_temp(r#"{"steps":[{"id":"s1","messages":["hi"]}]}"#);
        let store = ScriptStore::new(file.path());
        assert!(matches!(store.current(), Err(AppError::ScriptLoad(_))));

        store.load().await.unwrap();
        assert_eq!(store.current().unwrap().start_step().unwrap().id, "s1");

        std::fs::write(file.path(), "{ broken").unwrap();
        let result = store.load().await;
        assert!(matches!(result, Err(AppError::ScriptLoad(_))));
        assert_eq!(store.current().unwrap().start_step().unwrap().id, "s1");
    }

    #[tokio::test]
    async fn test_reload_is_visible_to_clones() {
        let file = write_temp(r#"{"steps":[{"id":"old"}]}"#);
        let store = ScriptStore::new(file.path());
        let clone = store.clone();
        store.load().await.unwrap();

        std::fs::write(file.path(), r#"{"steps":[{"id":"new"}]}"#).unwrap();
        store.load().await.unwrap();
        assert!(clone.current().unwrap().find_step("new").is_some());
        assert!(clone.current().unwrap().find_step("old").is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_script_load_error() {
        let store = ScriptStore::new("/definitely/not/here/script.json");
        assert!(matches!(store.load().await, Err(AppError::ScriptLoad(_))));
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_bundled_script_is_valid() {
        let script = Script::from_json(include_str!("../../data/script.json")).unwrap();
        assert_eq!(script.start_step().unwrap().id, "greeting");
        for step in script.steps() {
            if let Some(expect) = &step.expect {
                let targets = match expect {
                    crate::script::Expect::YesNo { yes, no } => {
                        std::iter::once(yes).chain(no.as_ref()).collect::<Vec<_>>()
                    }
                    crate::script::Expect::FreeText { next } => vec![next],
                };
                for target in targets {
                    assert!(script.find_step(target).is_some(), "dangling {}", target);
                }
            }
        }
    }
}
