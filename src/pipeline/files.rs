use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Maps web-root relative source paths to physical files.
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Return the physical path of an existing regular file, or `None`.
    async fn resolve(&self, relative: &str) -> Option<PathBuf>;
}

/// Resolves source paths beneath a fixed web root directory.
#[derive(Debug, Clone)]
pub struct WebRootProvider {
    root: PathBuf,
}

impl WebRootProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl FileProvider for WebRootProvider {
    async fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let candidate = relative.trim_start_matches('/');
        if candidate.is_empty() || candidate.ends_with('/') {
            return None;
        }

        // Source paths may not escape the web root.
        let escapes = Path::new(candidate)
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }

        let path = self.root.join(candidate);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_existing_files_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("js")).expect("mkdir");
        std::fs::write(dir.path().join("js/a.js"), "var a=1;").expect("write");

        let provider = WebRootProvider::new(dir.path());

        assert_eq!(
            provider.resolve("js/a.js").await,
            Some(dir.path().join("js/a.js"))
        );
        assert_eq!(
            provider.resolve("/js/a.js").await,
            Some(dir.path().join("js/a.js"))
        );
        assert!(provider.resolve("js/missing.js").await.is_none());
        assert!(provider.resolve("js").await.is_none());
        assert!(provider.resolve("js/").await.is_none());
    }

    #[tokio::test]
    async fn rejects_paths_outside_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("wwwroot");
        std::fs::create_dir(&root).expect("mkdir");
        std::fs::write(dir.path().join("secret.txt"), "secret").expect("write");

        let provider = WebRootProvider::new(&root);
        assert!(provider.resolve("../secret.txt").await.is_none());
    }
}
