//! Small filesystem helpers shared by the installer and materializer

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Whether anything at all exists at `path`, dangling symlinks included
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Set permission bits on an open file
#[cfg(unix)]
pub fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
pub fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Set permission bits on a path
#[cfg(unix)]
pub fn set_path_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
pub fn set_path_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Write `content` to `path` so readers never observe a partial file
///
/// The data goes to a temp file in the same directory, gets `mode`, is
/// flushed and closed, and is then renamed over `path`. On failure the temp
/// file is removed and `path` is untouched.
pub fn write_file_atomic(path: &Path, content: &[u8], mode: u32) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
    })?;

    let mut file = tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)?;
    file.write_all(content)?;
    set_mode(file.as_file(), mode)?;
    file.as_file().sync_all()?;

    // Closes the handle before the rename
    file.into_temp_path().persist(path).map_err(|e| e.error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_file_atomic_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.yaml");

        write_file_atomic(&path, b"a: 1\n", 0o644).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 1\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_write_file_atomic_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.yaml");
        write_file_atomic(&path, b"x", 0o644).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_write_file_atomic_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        write_file_atomic(&dir.path().join("a"), b"1", 0o644).unwrap();
        write_file_atomic(&dir.path().join("a"), b"2", 0o644).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a")]);
        assert_eq!(fs::read_to_string(dir.path().join("a")).unwrap(), "2");
    }

    #[test]
    fn test_write_file_atomic_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("a");
        assert!(write_file_atomic(&path, b"1", 0o644).is_err());
        assert!(!entry_exists(&path));
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_exists_sees_dangling_symlink() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), &link).unwrap();

        assert!(!link.exists());
        assert!(entry_exists(&link));
    }
}
