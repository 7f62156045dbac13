use anyhow::{Result, Context};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

/// Extensions read by the plain text extractor
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Output path next to the input, "<stem><suffix>.<extension>"
    // @params: input_file, output_dir, suffix, extension
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>>(
        input_file: P1,
        output_dir: P2,
        suffix: &str,
        extension: &str,
    ) -> PathBuf {
        let stem = Self::file_stem(input_file);
        output_dir.as_ref().join(format!("{}{}.{}", stem, suffix, extension))
    }

    // @returns: File name without extension, "output" when there is none
    pub fn file_stem<P: AsRef<Path>>(path: P) -> String {
        path.as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "output".to_string())
    }

    /// Find every document a converter can process under a directory, sorted by path
    pub fn find_documents<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && Self::detect_file_type(path) != FileType::Unknown {
                // skip our own normalize-only exports
                let stem = Self::file_stem(path);
                if stem.ends_with("_speakable") {
                    continue;
                }
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Detect the document type from the file extension
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> FileType {
        let ext = match path.as_ref().extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => return FileType::Unknown,
        };

        match ext.as_str() {
            e if TEXT_EXTENSIONS.contains(&e) => FileType::Text,
            "pdf" => FileType::Pdf,
            "epub" => FileType::Epub,
            _ => FileType::Unknown,
        }
    }
}

/// Enum representing different input document types
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FileType {
    /// Plain text or Markdown
    Text,
    /// PDF document
    Pdf,
    /// EPUB book
    Epub,
    /// Anything else
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generateOutputPath_shouldUseStemAndSuffix() {
        let path = FileManager::generate_output_path("/books/livro.txt", "/out", "_speakable", "txt");
        assert_eq!(path, PathBuf::from("/out/livro_speakable.txt"));
    }

    #[test]
    fn test_detectFileType_shouldUseExtension() {
        assert_eq!(FileManager::detect_file_type("a.TXT"), FileType::Text);
        assert_eq!(FileManager::detect_file_type("a.md"), FileType::Text);
        assert_eq!(FileManager::detect_file_type("a.pdf"), FileType::Pdf);
        assert_eq!(FileManager::detect_file_type("a.epub"), FileType::Epub);
        assert_eq!(FileManager::detect_file_type("a.mp3"), FileType::Unknown);
        assert_eq!(FileManager::detect_file_type("README"), FileType::Unknown);
    }

    #[test]
    fn test_findDocuments_shouldSkipExportsAndUnknownFiles() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("a_speakable.txt"), "a").unwrap();
        fs::write(dir.path().join("cover.jpg"), "x").unwrap();

        let found = FileManager::find_documents(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }
}
