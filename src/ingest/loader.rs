use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Document formats the ingestion pipeline can extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// A candidate source file found in the documents directory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub format: DocumentFormat,
}

/// List the files directly inside `directory` whose format is in `formats`,
/// sorted by file name.
pub async fn discover(directory: &Path, formats: &[DocumentFormat]) -> Result<Vec<SourceFile>> {
    let mut entries = tokio::fs::read_dir(directory).await.map_err(|e| {
        AppError::Ingestion(format!(
            "Cannot read documents directory {}: {e}",
            directory.display()
        ))
    })?;

    let mut files = Vec::new();
    loop {
        let entry = entries.next_entry().await.map_err(|e| {
            AppError::Ingestion(format!(
                "Cannot list documents directory {}: {e}",
                directory.display()
            ))
        })?;
        let Some(entry) = entry else {
            break;
        };
        let path = entry.path();

        // Follows symlinks; dangling links are skipped
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            }
        }

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension);

        if let Some(format) = format.filter(|f| formats.contains(f)) {
            files.push(SourceFile {
                name: entry.file_name().to_string_lossy().to_string(),
                path,
                format,
            });
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Extract the text of one document.
pub async fn load_text(file: &SourceFile) -> Result<String> {
    let text = match file.format {
        DocumentFormat::Pdf => {
            let bytes = tokio::fs::read(&file.path).await?;
            // pdf-extract is synchronous and may panic on malformed input
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| AppError::Ingestion(format!("PDF extraction aborted: {e}")))?
                .map_err(|e| AppError::Ingestion(format!("Failed to extract text: {e}")))?
        }
        DocumentFormat::PlainText | DocumentFormat::Markdown => {
            tokio::fs::read_to_string(&file.path).await?
        }
    };

    if text.trim().is_empty() {
        return Err(AppError::Ingestion(
            "Document contains no extractable text (may be image-based)".to_string(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::PlainText));
        assert_eq!(DocumentFormat::from_extension("docx"), None);
    }

    #[tokio::test]
    async fn test_discover_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("notes.docx"), "x").unwrap();
        fs::write(tmp.path().join("policy.pdf"), "x").unwrap();
        fs::create_dir(tmp.path().join("nested.txt")).unwrap();

        let files = discover(tmp.path(), &[DocumentFormat::PlainText]).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_follows_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        fs::write(shared.path().join("beneficios.txt"), "Vale-refeição.").unwrap();
        std::os::unix::fs::symlink(shared.path().join("beneficios.txt"), tmp.path().join("beneficios.txt")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone.txt"), tmp.path().join("dangling.txt")).unwrap();

        let files = discover(tmp.path(), &[DocumentFormat::PlainText]).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["beneficios.txt"]);
    }

    #[tokio::test]
    async fn test_discover_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err = discover(&missing, &[DocumentFormat::Pdf]).await.unwrap_err();
        assert!(matches!(err, AppError::Ingestion(_)));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails_to_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.pdf");
        fs::write(&path, b"definitely not a pdf").unwrap();

        let file = SourceFile {
            path,
            name: "broken.pdf".to_string(),
            format: DocumentFormat::Pdf,
        };
        assert!(load_text(&file).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_text_file_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.txt");
        fs::write(&path, "   \n").unwrap();

        let file = SourceFile {
            path,
            name: "empty.txt".to_string(),
            format: DocumentFormat::PlainText,
        };
        assert!(load_text(&file).await.is_err());
    }
}
