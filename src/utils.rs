use crate::Result;
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
}

/// Read a file to a `String`.
pub(crate) async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
}

/// Deserialize a JSON file into type `T`.
pub(crate) async fn deserialize<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = read(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file at {}", path.display()))
}

/// Create a directory and all of its parents if they do not exist.
pub(crate) async fn make_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("Unable to create directory at {}", path.display()))
}

/// Returns the canonical, absolute form of `path`.
pub(crate) async fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("Unable to canonicalize the path {}", path.display()))
}

/// Removes a file. A file that does not exist is not an error. Returns `true` if a file was
/// removed.
pub(crate) async fn remove_file(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Unable to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_remove_missing_file() {
        let dir = TempDir::new().unwrap();
        let removed = remove_file(dir.path().join("nope.json")).await.unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("a").join("b.txt");
        make_dir(p.parent().unwrap()).await.unwrap();
        write(&p, "hello").await.unwrap();
        assert_eq!("hello", read(&p).await.unwrap());
        assert!(remove_file(&p).await.unwrap());
        assert!(!p.exists());
    }
}
