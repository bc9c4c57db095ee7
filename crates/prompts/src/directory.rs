//! Prompt directory access.
//!
//! Discovers prompt files in a single (non-recursive) directory, reads and
//! parses them, and removes them once they have been processed. All I/O goes
//! through `tokio::fs`.

use crate::error::{ErrorKind, Result};
use crate::prompt::{Prompt, parse};
use derive_more::Display;
use std::ffi::OsStr;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// Extension of prompt files when none is configured.
pub const DEFAULT_EXTENSION: &str = "txt";

/// A prompt file discovered by [`PromptDirectory::scan`].
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("{name}")]
pub struct PromptFile {
    /// Full path (the directory root joined with the file name).
    pub path: PathBuf,
    /// File name, used for ordering and log output.
    pub name: String,
    /// File size in bytes at the time of the scan.
    pub size: u64,
}

/// A directory of prompt files.
///
/// # Examples
///
/// ```no_run
/// use promptdrop_prompts::PromptDirectory;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = PromptDirectory::open("prompts", "txt")?;
/// for file in dir.scan().await? {
///     let prompts = dir.read(&file).await?;
///     println!("{file}: {} prompts", prompts.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PromptDirectory {
    root: PathBuf,
    extension: String,
}
impl PromptDirectory {
    /// Open (creating it if needed) the directory at `root`.
    ///
    /// `extension` is matched case-sensitively and without the leading dot.
    ///
    /// # Errors
    ///
    /// Returns [`NotADirectory`](ErrorKind::NotADirectory) if `root` exists
    /// but is something else, or an I/O error if it cannot be created.
    pub fn open(root: impl AsRef<Path>, extension: impl AsRef<str>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::NotADirectory(root));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| ErrorKind::from_io(e, &root))?;
            tracing::info!(path = %root.display(), "Created prompts directory");
        }
        let extension = extension.as_ref().trim_start_matches('.').to_string();
        Ok(Self { root, extension })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// List the prompt files in the directory, sorted by file name.
    ///
    /// An empty list is a valid result.
    pub async fn scan(&self) -> Result<Vec<PromptFile>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| ErrorKind::from_io(e, &self.root))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, &self.root))? {
            if let Some(file) = self.process_entry(entry).await {
                files.push(file);
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!(path = %self.root.display(), count = files.len(), "Scanned prompts directory");
        Ok(files)
    }

    /// A single unusable entry is skipped rather than failing the whole scan.
    async fn process_entry(&self, entry: DirEntry) -> Option<PromptFile> {
        let path = entry.path();
        if path.extension() != Some(OsStr::new(&self.extension)) {
            return None;
        }
        let Some(name) = path.file_name().and_then(OsStr::to_str).map(str::to_string) else {
            tracing::warn!(path = %path.display(), "Skipping prompt file with a non UTF-8 name");
            return None;
        };
        // Follows symlinks, unlike `DirEntry::metadata`.
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            // Removed between listing and stat; nothing to process.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping prompt file that cannot be inspected");
                return None;
            },
        };
        if !metadata.is_file() {
            return None;
        }
        Some(PromptFile { path, name, size: metadata.len() })
    }

    /// Read and parse a prompt file.
    ///
    /// # Errors
    ///
    /// The file vanished, is unreadable, or is not valid UTF-8.
    pub async fn read(&self, file: &PromptFile) -> Result<Vec<Prompt>> {
        let contents = fs::read_to_string(&file.path).await.map_err(|e| ErrorKind::from_io(e, &file.path))?;
        let prompts = parse(&contents);
        tracing::debug!(file = %file.name, prompts = prompts.len(), "Read prompts");
        Ok(prompts)
    }

    /// Remove a processed prompt file.
    pub async fn delete(&self, file: &PromptFile) -> Result<()> {
        fs::remove_file(&file.path).await.map_err(|e| ErrorKind::from_io(e, &file.path))?;
        tracing::debug!(file = %file.name, "Deleted prompt file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir, write};

    fn names(files: &[PromptFile]) -> Vec<&str> {
        files.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_open_creates_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("prompts");
        assert!(!root.exists());
        let dir = PromptDirectory::open(&root, "txt").unwrap();
        assert!(root.is_dir());
        assert_eq!(dir.root(), root);
    }

    #[test]
    fn test_open_rejects_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("prompts");
        write(&file, b"not a directory").unwrap();
        let err = PromptDirectory::open(&file, "txt").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotADirectory(_)));
    }

    #[test]
    fn test_open_strips_leading_dot() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = PromptDirectory::open(temp_dir.path(), ".txt").unwrap();
        assert_eq!(dir.extension(), "txt");
    }

    #[tokio::test]
    async fn test_scan_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = PromptDirectory::open(temp_dir.path(), "txt").unwrap();
        assert!(dir.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_filters_and_sorts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        write(root.join("b.txt"), "two").unwrap();
        write(root.join("a.txt"), "one").unwrap();
        write(root.join("C.txt"), "three").unwrap();
        write(root.join("notes.md"), "ignored").unwrap();
        write(root.join("upper.TXT"), "case sensitive").unwrap();
        write(root.join("txt"), "no extension").unwrap();
        create_dir(root.join("nested.txt")).unwrap();
        write(root.join("nested.txt").join("deep.txt"), "not recursive").unwrap();
        let dir = PromptDirectory::open(root, "txt").unwrap();
        let files = dir.scan().await.unwrap();
        assert_eq!(names(&files), ["C.txt", "a.txt", "b.txt"]);
        assert_eq!(files[1].path, root.join("a.txt"));
        assert_eq!(files[1].size, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_skips_entries_that_cannot_be_inspected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        write(root.join("a.txt"), "cat").unwrap();
        // Stat on a self-referencing symlink fails with ELOOP, not NotFound.
        std::os::unix::fs::symlink(root.join("loop.txt"), root.join("loop.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("gone"), root.join("dangling.txt")).unwrap();
        write(root.join("b.txt"), "dog").unwrap();
        let dir = PromptDirectory::open(root, "txt").unwrap();
        let files = dir.scan().await.unwrap();
        assert_eq!(names(&files), ["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_scan_missing_directory_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("prompts");
        let dir = PromptDirectory::open(&root, "txt").unwrap();
        std::fs::remove_dir(&root).unwrap();
        let err = dir.scan().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_parses_prompts() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path().join("a.txt"), "cat\n# comment\n\ndog\n").unwrap();
        let dir = PromptDirectory::open(temp_dir.path(), "txt").unwrap();
        let files = dir.scan().await.unwrap();
        let prompts = dir.read(&files[0]).await.unwrap();
        let prompts: Vec<&str> = prompts.iter().map(Prompt::as_str).collect();
        assert_eq!(prompts, ["cat", "dog"]);
    }

    #[tokio::test]
    async fn test_read_invalid_utf8() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path().join("bad.txt"), [0x66, 0x6f, 0xff, 0xfe, 0x0a]).unwrap();
        let dir = PromptDirectory::open(temp_dir.path(), "txt").unwrap();
        let files = dir.scan().await.unwrap();
        let err = dir.read(&files[0]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidEncoding(_)));
    }

    #[tokio::test]
    async fn test_read_vanished_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path().join("a.txt"), "cat").unwrap();
        let dir = PromptDirectory::open(temp_dir.path(), "txt").unwrap();
        let files = dir.scan().await.unwrap();
        std::fs::remove_file(&files[0].path).unwrap();
        let err = dir.read(&files[0]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = tempfile::tempdir().unwrap();
        write(temp_dir.path().join("a.txt"), "cat").unwrap();
        let dir = PromptDirectory::open(temp_dir.path(), "txt").unwrap();
        let files = dir.scan().await.unwrap();
        dir.delete(&files[0]).await.unwrap();
        assert!(!files[0].path.exists());
        assert!(dir.scan().await.unwrap().is_empty());
        // Deleting it twice is an error
        assert!(dir.delete(&files[0]).await.is_err());
    }
}
