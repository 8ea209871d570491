use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Blob storage addressed by bucket-relative keys in one flat namespace.
pub trait ObjectStore {
    fn object_exists(&self, key: &str) -> Result<bool, String>;

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String>;

    fn read_object(&self, key: &str) -> Result<Vec<u8>, String>;

    /// Copies the object to `destination` and returns that path.
    fn download_to_local(&self, key: &str, destination: &Path) -> Result<PathBuf, String> {
        let body = self.read_object(key)?;
        fs::write(destination, body)
            .map_err(|error| format!("failed to write local copy of {key}: {error}"))?;
        Ok(destination.to_path_buf())
    }
}

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Process-unique scratch file path under the system temp directory.
pub fn scratch_path(label: &str) -> PathBuf {
    let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "scenario-cache-{}-{sequence}-{label}",
        std::process::id()
    ))
}

/// Directory-backed store for local runs. Writes go to a scratch sibling and
/// are renamed into place, so readers never see a partially written object.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, String> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(format!("invalid object key: {key}"));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn object_exists(&self, key: &str) -> Result<bool, String> {
        match fs::metadata(self.path_for(key)?) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(format!("failed to stat {key}: {error}")),
        }
    }

    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| format!("object key has no parent directory: {key}"))?;
        fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create directory for {key}: {error}"))?;

        let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let staging = parent.join(format!(".staging-{}-{sequence}", std::process::id()));
        fs::write(&staging, body)
            .map_err(|error| format!("failed to write staging file for {key}: {error}"))?;
        fs::rename(&staging, &path).map_err(|error| {
            let _ = fs::remove_file(&staging);
            format!("failed to move {key} into place: {error}")
        })
    }

    fn read_object(&self, key: &str) -> Result<Vec<u8>, String> {
        fs::read(self.path_for(key)?).map_err(|error| format!("failed to read {key}: {error}"))
    }

    fn download_to_local(&self, key: &str, destination: &Path) -> Result<PathBuf, String> {
        fs::copy(self.path_for(key)?, destination)
            .map_err(|error| format!("failed to copy {key} to local file: {error}"))?;
        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_reads_nested_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path());

        assert!(!store.object_exists("a/b/c.csv").expect("exists check"));
        store.write_object("a/b/c.csv", b"x,y\n").expect("write");
        assert!(store.object_exists("a/b/c.csv").expect("exists check"));
        assert_eq!(store.read_object("a/b/c.csv").expect("read"), b"x,y\n");

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("a/b"))
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".staging"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rejects_keys_that_leave_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path());

        let error = store
            .write_object("../escape.csv", b"x")
            .expect_err("parent traversal should fail");
        assert!(error.contains("invalid object key"));
        assert!(store.object_exists("/etc/passwd").is_err());
    }

    #[test]
    fn downloads_to_requested_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(dir.path().join("bucket"));
        store.write_object("k/v.json", b"{}").expect("write");

        let destination = dir.path().join("local.json");
        let local = store
            .download_to_local("k/v.json", &destination)
            .expect("download");
        assert_eq!(local, destination);
        assert_eq!(fs::read(local).expect("read local"), b"{}");
    }

    #[test]
    fn scratch_paths_are_unique() {
        assert_ne!(scratch_path("same"), scratch_path("same"));
    }
}
