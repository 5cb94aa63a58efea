//! Shared input checks and crash-safe output writing for handlers.
//!
//! Outputs are written to a temporary sibling file and renamed into place, so
//! a failing handler never leaves a truncated output behind.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::error::TaskError;

/// Fail with `NotFound` unless `path` exists.
///
/// `what` names the input in the message, e.g. "Input file".
pub fn require_exists(path: &str, what: &str) -> Result<(), TaskError> {
    if Path::new(path).exists() {
        Ok(())
    } else {
        Err(TaskError::NotFound(format!("{} {} does not exist.", what, path)))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Atomically replace `path` with `contents`.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("output path {} has no file name", path.display()),
        )
    })?;
    let tmp = parent_dir(path).join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4()
    ));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Serialize `value` as JSON with 4-space indentation.
pub fn to_json_pretty<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Atomically write `value` as indented JSON.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = to_json_pretty(value).map_err(io::Error::other)?;
    write_atomic(path, &bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "old contents that are longer").unwrap();

        write_atomic(&path, b"new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_write_atomic_missing_directory_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        assert!(write_atomic(&path, b"x").await.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_json_uses_four_space_indent() {
        let bytes = to_json_pretty(&json!({ "a": [1] })).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\n    \"a\": [\n        1\n    ]\n}"
        );
    }

    #[test]
    fn test_require_exists() {
        let err = require_exists("/no/such/file", "Input file").unwrap_err();
        assert_eq!(err.to_string(), "Input file /no/such/file does not exist.");
    }
}
