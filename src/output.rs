use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::OutputTarget;

/// Characters removed from a thread title to form its file name.
const FORBIDDEN: &[char] = &['[', '<', '\\', '\'', '|', '/', '"', '?', '*', '%', '>', ']', ' '];

/// File-name form of a thread title.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title.chars().filter(|c| !FORBIDDEN.contains(c)).collect()
}

/// Path of the document written for `file_stem`.
#[must_use]
pub fn document_path(output_dir: &Path, file_stem: &str) -> PathBuf {
    output_dir.join(format!("{file_stem}.html"))
}

/// Write a finished document to its target.
///
/// Returns the written path, or `None` when the document went to stdout.
///
/// # Errors
///
/// Returns an error if the output directory or file cannot be written.
pub async fn write_document(
    target: OutputTarget,
    output_dir: &Path,
    file_stem: &str,
    document: &str,
) -> Result<Option<PathBuf>> {
    match target {
        OutputTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(document.as_bytes())
                .and_then(|()| stdout.write_all(b"\n"))
                .and_then(|()| stdout.flush())
                .context("Failed to write document to stdout")?;
            Ok(None)
        }
        OutputTarget::File => {
            tokio::fs::create_dir_all(output_dir).await.with_context(|| {
                format!("Failed to create output directory: {}", output_dir.display())
            })?;
            let path = document_path(output_dir, file_stem);
            tokio::fs::write(&path, document)
                .await
                .with_context(|| format!("Failed to write document: {}", path.display()))?;
            info!(path = %path.display(), "Wrote thread document");
            Ok(Some(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("a b/c?d*e"), "abcde");
        assert_eq!(sanitize_title(r#"[x]<y>\'|"%"#), "xy");
        assert_eq!(sanitize_title("中文:标题"), "中文:标题");
        assert_eq!(sanitize_title("   "), "");
    }

    #[tokio::test]
    async fn test_write_document_creates_directory() {
        let dir = TempDir::new().unwrap();
        let output_dir = dir.path().join("nested/out");

        let path = write_document(OutputTarget::File, &output_dir, "thread", "<html></html>")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(path, output_dir.join("thread.html"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }

    #[tokio::test]
    async fn test_write_document_overwrites() {
        let dir = TempDir::new().unwrap();
        write_document(OutputTarget::File, dir.path(), "t", "old")
            .await
            .unwrap();
        write_document(OutputTarget::File, dir.path(), "t", "new")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("t.html")).unwrap(),
            "new"
        );
    }
}
