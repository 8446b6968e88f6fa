//! Scratch files for batch-mode external tools, removed on drop.

use anyhow::Result;
use std::path::{Path, PathBuf};

/// A newline-delimited input file handed to a batch tool (httpx, naabu).
/// The file is deleted when the guard goes out of scope, on every exit path.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Write `lines` to a fresh file under the system temp directory.
    pub fn with_lines(prefix: &str, lines: &[String]) -> Result<Self> {
        let name = format!("{}-{}.txt", prefix, std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, format!("{}\n", lines.join("\n")))?;
        Ok(ScratchFile { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_entry() {
        let lines = vec!["a.example.com".to_string(), "b.example.com".to_string()];
        let f = ScratchFile::with_lines("surface-test", &lines).unwrap();
        let body = std::fs::read_to_string(f.path()).unwrap();
        assert_eq!(body, "a.example.com\nb.example.com\n");
    }

    #[test]
    fn removes_the_file_on_drop() {
        let f = ScratchFile::with_lines("surface-test-drop", &["x".to_string()]).unwrap();
        let path = f.path().to_path_buf();
        assert!(path.exists());
        drop(f);
        assert!(!path.exists());
    }
}
