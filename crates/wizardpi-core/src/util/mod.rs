pub mod http;

use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Short human-readable preview of a session blob for logs.
pub fn blob_preview(data: &[u8], max_bytes: usize) -> String {
    let shown: Vec<String> = data.iter().take(max_bytes).map(|b| format!("{:02x}", b)).collect();
    if data.len() > max_bytes {
        format!("{}.. ({} bytes)", shown.join(""), data.len())
    } else {
        format!("{} ({} bytes)", shown.join(""), data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_preview() {
        assert_eq!(blob_preview(&[], 4), " (0 bytes)");
        assert_eq!(blob_preview(&[1, 2, 255], 4), "0102ff (3 bytes)");
        assert_eq!(blob_preview(&[1, 2, 3, 4, 5], 2), "0102.. (5 bytes)");
    }

    #[test]
    fn test_ensure_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let subdir = tmp.path().join("a").join("b").join("c");
        assert!(!subdir.exists());
        ensure_dir(&subdir).unwrap();
        assert!(subdir.exists());
    }
}
