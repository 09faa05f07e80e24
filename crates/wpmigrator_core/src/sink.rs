use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{MigrateError, Result};

/// Writes files under one directory and refuses to touch any path twice.
#[derive(Debug)]
pub struct FileSink {
    root: PathBuf,
    written: BTreeSet<PathBuf>,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|source| MigrateError::Io {
            path: self.root.clone(),
            source,
        })
    }

    /// Create `root/filename` exclusively and write `contents` into it.
    pub fn write(&mut self, filename: &str, contents: &str) -> Result<PathBuf> {
        let path = self.resolve(filename)?;
        info!(path = %path.display(), "writing data");
        if self.written.contains(&path) || path.exists() {
            return Err(MigrateError::PathExists { path });
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => MigrateError::PathExists { path: path.clone() },
                _ => MigrateError::Io {
                    path: path.clone(),
                    source,
                },
            })?;
        self.written.insert(path.clone());
        file.write_all(contents.as_bytes())
            .map_err(|source| MigrateError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let trimmed = filename.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('.')
            || trimmed.contains(['/', '\\'])
        {
            return Err(MigrateError::invalid_field(
                "filename",
                format!("`{filename}` is not a plain file name"),
            ));
        }
        Ok(self.root.join(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn write_creates_file_under_root() {
        let temp = tempdir().expect("tempdir");
        let mut sink = FileSink::new(temp.path().join("_posts"));
        sink.ensure_root().expect("root");

        let path = sink.write("2021-05-09-hello.md", "---\n").expect("write");
        assert_eq!(path, temp.path().join("_posts").join("2021-05-09-hello.md"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "---\n");
        assert_eq!(sink.written_count(), 1);
    }

    #[test]
    fn existing_paths_are_never_overwritten() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("about.md"), "original").expect("seed file");
        let mut sink = FileSink::new(temp.path());

        let error = sink.write("about.md", "replacement").expect_err("must fail");
        assert!(matches!(error, MigrateError::PathExists { .. }));
        assert_eq!(
            fs::read_to_string(temp.path().join("about.md")).expect("read"),
            "original"
        );

        sink.write("contact.md", "first").expect("first write");
        let error = sink.write("contact.md", "second").expect_err("must fail");
        assert!(matches!(error, MigrateError::PathExists { .. }));
    }

    #[test]
    fn nested_or_hidden_names_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let mut sink = FileSink::new(temp.path());
        for name in ["../escape.md", "a/b.md", ".hidden.md", ""] {
            let error = sink.write(name, "x").expect_err("must fail");
            assert!(matches!(error, MigrateError::InvalidField { .. }), "{name}");
        }
    }
}
