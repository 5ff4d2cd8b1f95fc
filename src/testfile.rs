use crate::Result;
use rand::RngCore;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const MB: usize = 1024 * 1024;

/// Creates `test-<size>mb.bin` under `dir` from repeated pseudo-random data,
/// reusing the file when it already exists.
pub fn create_test_file(dir: &Path, size_mb: u64) -> Result<PathBuf> {
    let path = dir.join(format!("test-{}mb.bin", size_mb));
    if path.exists() {
        return Ok(path);
    }

    info!("Creating {} MB test file at {}", size_mb, path.display());

    let mut buffer = vec![0u8; MB];
    rand::thread_rng().fill_bytes(&mut buffer);

    let mut file = File::create(&path)?;
    for _ in 0..size_mb {
        file.write_all(&buffer)?;
    }
    file.flush()?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_file_of_exact_size() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), 3).unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, 3 * 1024 * 1024);
    }

    #[test]
    fn reuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let first = create_test_file(dir.path(), 1).unwrap();
        let original = std::fs::read(&first).unwrap();

        let second = create_test_file(dir.path(), 1).unwrap();
        assert_eq!(first, second);
        // Unchanged content proves the file was not regenerated.
        assert_eq!(original, std::fs::read(&second).unwrap());
    }

    #[test]
    fn zero_megabytes_is_an_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), 0).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
