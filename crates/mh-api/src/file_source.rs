use std::fs;
use std::path::{Path, PathBuf};

use mh_core::MapHackError;
use mh_runtime::ScriptSource;

/// Script files under a game directory; paths are resolved relative to it.
#[derive(Debug, Clone)]
pub struct FileScriptSource {
    root: PathBuf,
}

impl FileScriptSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let relative = path.replace('\\', "/");
        self.root.join(relative.trim_start_matches('/'))
    }
}

impl ScriptSource for FileScriptSource {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn load(&self, path: &str) -> Result<String, MapHackError> {
        let resolved = self.resolve(path);
        fs::read_to_string(&resolved).map_err(|error| {
            MapHackError::new(
                "MH_IO_ERROR",
                format!("Failed to read {}: {}", resolved.display(), error),
            )
        })
    }
}
