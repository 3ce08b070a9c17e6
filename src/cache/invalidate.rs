//! Pull-based invalidation for rendered bundles.
//!
//! A snapshot records each source file's modification time and length when
//! a bundle is rendered. On every cache hit the files are stat'ed again and
//! any difference marks the entry stale. No watchers, no background tasks.

use std::{path::PathBuf, time::SystemTime};

/// Observed state of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
    pub len: Option<u64>,
}

impl Dependency {
    async fn observe(path: PathBuf) -> Self {
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Self {
                modified: metadata.modified().ok(),
                len: Some(metadata.len()),
                path,
            },
            Err(_) => Self {
                path,
                modified: None,
                len: None,
            },
        }
    }
}

/// The source files a rendered bundle was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySnapshot {
    entries: Vec<Dependency>,
}

impl DependencySnapshot {
    /// Stat every path. Must run before the files are read so that a write
    /// racing with the render is caught on the next hit.
    pub async fn capture<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut entries = Vec::new();
        for path in paths {
            entries.push(Dependency::observe(path).await);
        }
        Self { entries }
    }

    /// Re-stat every dependency and compare with the recorded state.
    pub async fn is_current(&self) -> bool {
        for recorded in &self.entries {
            let observed = Dependency::observe(recorded.path.clone()).await;
            if observed.modified.is_none() || observed != *recorded {
                return false;
            }
        }
        true
    }

    /// Most recent modification time across all dependencies.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.entries.iter().filter_map(|entry| entry.modified).max()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, path::Path, time::Duration};

    use super::*;

    fn touch(path: &Path, offset_secs: u64) {
        let file = File::options().write(true).open(path).expect("open");
        file.set_modified(SystemTime::now() + Duration::from_secs(offset_secs))
            .expect("set mtime");
    }

    #[tokio::test]
    async fn unchanged_files_stay_current() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.js");
        std::fs::write(&path, "var a=1;").expect("write");

        let snapshot = DependencySnapshot::capture([path]).await;
        assert!(snapshot.is_current().await);
        assert!(snapshot.last_modified().is_some());
    }

    #[tokio::test]
    async fn touched_file_makes_snapshot_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        std::fs::write(&a, "var a=1;").expect("write");
        std::fs::write(&b, "var b=2;").expect("write");

        let snapshot = DependencySnapshot::capture([a, b.clone()]).await;
        touch(&b, 60);

        assert!(!snapshot.is_current().await);
    }

    #[tokio::test]
    async fn removed_file_makes_snapshot_stale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.css");
        std::fs::write(&path, "body{}").expect("write");

        let snapshot = DependencySnapshot::capture([path.clone()]).await;
        std::fs::remove_file(&path).expect("remove");

        assert!(!snapshot.is_current().await);
    }
}
