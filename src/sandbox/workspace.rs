use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Failure to materialize a submission on disk
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("cannot create a working directory under {}: {source}", root.display())]
    CreateDir {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write script {}: {source}", path.display())]
    WriteScript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A private directory holding one submitted script for the length of a grading run
///
/// Every run gets a fresh `run-XXXXXX` directory under the configured root, so
/// concurrent runs never share files. The directory and everything in it is
/// removed when the workspace is dropped; removal errors are ignored.
#[derive(Debug)]
pub struct ScriptWorkspace {
    dir: TempDir,
    script: PathBuf,
}

impl ScriptWorkspace {
    pub fn create(root: &Path, file_name: &str, code: &str) -> Result<Self, WorkspaceError> {
        let create_err = |source| WorkspaceError::CreateDir {
            root: root.to_path_buf(),
            source,
        };

        // The interpreter receives an absolute script path
        let root = std::path::absolute(root).map_err(create_err)?;
        fs::create_dir_all(&root).map_err(create_err)?;
        let dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(&root)
            .map_err(create_err)?;

        let script = dir.path().join(file_name);
        fs::write(&script, code).map_err(|source| WorkspaceError::WriteScript {
            path: script.clone(),
            source,
        })?;

        log::debug!("Materialized script at {}", script.display());
        Ok(Self { dir, script })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ScriptWorkspace::create(root.path(), "Main.bsl", "Сообщить(1);").unwrap();

        let dir = workspace.dir().to_path_buf();
        assert!(workspace.script().is_absolute());
        assert_eq!(
            fs::read_to_string(workspace.script()).unwrap(),
            "Сообщить(1);"
        );

        drop(workspace);
        assert!(!dir.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_each_workspace_gets_its_own_directory() {
        let root = tempfile::tempdir().unwrap();
        let a = ScriptWorkspace::create(root.path(), "Main.bsl", "a").unwrap();
        let b = ScriptWorkspace::create(root.path(), "Main.bsl", "b").unwrap();
        assert_ne!(a.dir(), b.dir());
    }

    #[test]
    fn test_unusable_root_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let err = ScriptWorkspace::create(&blocker, "Main.bsl", "code").unwrap_err();
        assert!(matches!(err, WorkspaceError::CreateDir { .. }));
    }
}
