//! Filtering for `ragassist upload` when walking a local directory

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::document::DocumentKind;

pub struct IgnoreFilter {
    inner: Gitignore,
}

impl IgnoreFilter {
    pub fn new(root: &Path, extra_excludes: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        builder.add(root.join(".gitignore"));
        builder.add(root.join(".ignore"));

        let defaults = [
            ".git/", ".ragassist/", "node_modules/", "target/", "__pycache__/",
            ".venv/", "venv/", ".DS_Store", "*.db", "*.sqlite", "*.tmp", "~$*",
        ];
        for pattern in defaults {
            builder.add_line(None, pattern).ok();
        }

        for pattern in extra_excludes {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e);
            }
        }

        Self {
            inner: builder.build().unwrap_or_else(|_| Gitignore::empty()),
        }
    }

    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.inner.matched(path, is_dir).is_ignore()
    }
}

/// A local file to upload and the object key it maps to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub path: PathBuf,
    pub key: String,
    pub kind: DocumentKind,
}

/// Collect supported documents under `root` (or `root` itself if it is a file).
///
/// Keys are `prefix` joined with the `/`-separated path relative to `root`.
pub fn collect_uploads(root: &Path, prefix: &str, extra_excludes: &[String]) -> Vec<UploadCandidate> {
    if root.is_file() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        return DocumentKind::from_key(&name)
            .map(|kind| UploadCandidate {
                path: root.to_path_buf(),
                key: format!("{}{}", prefix, name),
                kind,
            })
            .into_iter()
            .collect();
    }

    let filter = IgnoreFilter::new(root, extra_excludes);
    let mut candidates: Vec<UploadCandidate> = WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !filter.is_ignored(entry.path(), is_dir)
        })
        .build()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            let kind = DocumentKind::from_key(&key)?;
            Some(UploadCandidate {
                path: e.path().to_path_buf(),
                key: format!("{}{}", prefix, key),
                kind,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.key.cmp(&b.key));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_uploads_filters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("aws")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("ml.txt"), "ml").unwrap();
        fs::write(root.join("aws/lambda.md"), "lambda").unwrap();
        fs::write(root.join("aws/diagram.png"), "png").unwrap();
        fs::write(root.join(".git/notes.txt"), "git").unwrap();
        fs::write(root.join("drafts/wip.txt"), "wip").unwrap();
        fs::write(root.join(".gitignore"), "drafts/\n").unwrap();

        let keys: Vec<String> = collect_uploads(root, "docs/", &[])
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(keys, vec!["docs/aws/lambda.md".to_string(), "docs/ml.txt".to_string()]);
    }

    #[test]
    fn test_extra_excludes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();

        let found = collect_uploads(dir.path(), "", &["*.md".to_string()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "a.txt");
        assert_eq!(found[0].kind, DocumentKind::Text);
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Guide.PDF");
        fs::write(&path, "%PDF").unwrap();

        let found = collect_uploads(&path, "", &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "Guide.PDF");
        assert_eq!(found[0].kind, DocumentKind::Pdf);
    }
}
