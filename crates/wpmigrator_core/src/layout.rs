use std::path::{Path, PathBuf};

pub const AUTHORS_DIR: &str = "_data/authors";
pub const POSTS_DIR: &str = "_posts";

/// Where each entity kind lands under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub authors_dir: PathBuf,
    pub posts_dir: PathBuf,
    pub pages_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, pages_dir: &str) -> Self {
        let root = root.into();
        Self {
            authors_dir: join_relative(&root, AUTHORS_DIR),
            posts_dir: join_relative(&root, POSTS_DIR),
            pages_dir: join_relative(&root, pages_dir),
            root,
        }
    }

    pub fn diagnostics(&self) -> String {
        format!(
            "output_root={}\nauthors_dir={}\nposts_dir={}\npages_dir={}",
            normalize_for_display(&self.root),
            normalize_for_display(&self.authors_dir),
            normalize_for_display(&self.posts_dir),
            normalize_for_display(&self.pages_dir),
        )
    }
}

fn join_relative(root: &Path, relative: &str) -> PathBuf {
    let mut output = root.to_path_buf();
    for segment in relative.split(['/', '\\']) {
        if !segment.is_empty() && segment != "." && segment != ".." {
            output.push(segment);
        }
    }
    output
}

fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
