//! Size-based rotating log file.
//!
//! [`RotatingFile`] appends to a single active file. When a write would take
//! the file past its configured size, the file is renamed to a timestamped
//! backup next to it and a fresh file is started. Backups are pruned by age
//! and count, and optionally gzipped, on a background thread.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod mill;

pub use config::{DEFAULT_MAX_SIZE, RotationConfig};
pub use error::{Error, Result};

use crate::mill::Mill;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// The file currently being written and how much it holds.
#[derive(Debug)]
struct Active {
    file: File,
    size: u64,
}

/// Log file writer that rotates by size and prunes old rotations.
///
/// Not internally synchronised: wrap it in a lock, or hand it to a single
/// writer such as a buffered sink worker.
#[derive(Debug)]
pub struct RotatingFile {
    config: RotationConfig,
    active: Option<Active>,
    mill: Mill,
}

impl RotatingFile {
    /// Creates the writer. No file is touched until the first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the mill thread
    /// cannot be started.
    pub fn new(config: RotationConfig) -> Result<Self> {
        config.validate()?;

        let mill = Mill::spawn(config.clone())?;

        Ok(Self {
            config,
            active: None,
            mill,
        })
    }

    /// The configuration this writer was created with.
    #[must_use]
    pub const fn config(&self) -> &RotationConfig {
        &self.config
    }

    /// Path of the active file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.filename
    }

    /// Closes the active file and starts a new one, keeping the old one as a
    /// backup.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename or the new file fails.
    pub fn rotate(&mut self) -> Result<()> {
        self.active = None;
        self.active = Some(self.open_new()?);
        Ok(())
    }

    /// Closes the active file. The next write reopens it.
    ///
    /// # Errors
    ///
    /// Returns an error if pending data cannot be synced to disk.
    pub fn close(&mut self) -> Result<()> {
        if let Some(active) = self.active.take() {
            active
                .file
                .sync_all()
                .map_err(|e| Error::Io("failed to sync log file", e))?;
        }
        Ok(())
    }

    fn write_record(&mut self, buf: &[u8]) -> Result<usize> {
        let len = buf.len() as u64;
        let max = self.config.max_size;

        if len > max {
            return Err(Error::WriteTooLarge { len, max });
        }

        let mut active = match self.active.take() {
            Some(active) if active.size + len > max => {
                drop(active);
                self.open_new()?
            }
            Some(active) => active,
            None => self.open_existing_or_new(len)?,
        };

        let result = active.file.write(buf);
        if let Ok(written) = result {
            active.size += written as u64;
        }
        self.active = Some(active);

        result.map_err(|e| Error::Io("failed to write log file", e))
    }

    /// Appends to the file left by a previous run when it has room for `len`
    /// more bytes, rotates it otherwise.
    fn open_existing_or_new(&self, len: u64) -> Result<Active> {
        self.mill.request();

        let metadata = match fs::metadata(&self.config.filename) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return self.open_new(),
            Err(e) => return Err(Error::Io("failed to stat log file", e)),
        };

        if metadata.len() + len > self.config.max_size {
            return self.open_new();
        }

        match OpenOptions::new()
            .append(true)
            .open(&self.config.filename)
        {
            Ok(file) => Ok(Active {
                file,
                size: metadata.len(),
            }),
            // Unreadable leftovers are moved aside rather than failing the write.
            Err(_) => self.open_new(),
        }
    }

    /// Moves any existing file to a backup name and creates an empty one.
    fn open_new(&self) -> Result<Active> {
        let filename = &self.config.filename;

        if let Some(dir) = filename.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .map_err(|e| Error::Io("failed to create log directory", e))?;
            }
        }

        if filename.exists() {
            let backup = mill::backup_path(filename, mill::now(self.config.local_time));
            fs::rename(filename, &backup)
                .map_err(|e| Error::Io("failed to rename log file", e))?;
            self.mill.request();
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(filename)
            .map_err(|e| Error::Io("failed to open new log file", e))?;

        Ok(Active { file, size: 0 })
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.write_record(buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.active.as_mut() {
            Some(active) => active.file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;
    use std::path::PathBuf;
    use std::time::Duration;

    use chrono::Utc;
    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    fn backups_in(dir: &Path, ext: &str) -> Vec<PathBuf> {
        let mut found: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                let name = path.file_name().unwrap().to_string_lossy();
                name.starts_with("access-") && name.ends_with(ext)
            })
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_first_write_creates_file_and_directories() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("nested").join("access.log");

        let mut file = RotatingFile::new(RotationConfig::new(&filename)).unwrap();
        file.write_all(b"hello\n").unwrap();
        file.flush().unwrap();

        assert_eq!(fs::read(&filename).unwrap(), b"hello\n");
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");
        fs::write(&filename, b"old\n").unwrap();

        let mut file = RotatingFile::new(RotationConfig::new(&filename)).unwrap();
        file.write_all(b"new\n").unwrap();
        drop(file);

        assert_eq!(fs::read(&filename).unwrap(), b"old\nnew\n");
        assert!(backups_in(dir.path(), ".log").is_empty());
    }

    #[test]
    fn test_full_existing_file_is_rotated_on_open() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");
        fs::write(&filename, b"12345678").unwrap();

        let config = RotationConfig::new(&filename).with_max_size(10);
        let mut file = RotatingFile::new(config).unwrap();
        file.write_all(b"abcd").unwrap();
        drop(file);

        assert_eq!(fs::read(&filename).unwrap(), b"abcd");

        let backups = backups_in(dir.path(), ".log");
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), b"12345678");
    }

    #[test]
    fn test_rotates_when_size_exceeded() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");

        let config = RotationConfig::new(&filename).with_max_size(10);
        let mut file = RotatingFile::new(config).unwrap();

        file.write_all(b"12345678").unwrap();
        file.write_all(b"ab").unwrap();
        // 10 bytes fit exactly; the next byte does not.
        file.write_all(b"c").unwrap();
        drop(file);

        assert_eq!(fs::read(&filename).unwrap(), b"c");

        let backups = backups_in(dir.path(), ".log");
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), b"12345678ab");
    }

    #[test]
    fn test_oversized_write_is_rejected() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");

        let config = RotationConfig::new(&filename).with_max_size(4);
        let mut file = RotatingFile::new(config).unwrap();

        let err = file.write(b"too long").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(!filename.exists());
    }

    #[test]
    fn test_explicit_rotate() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");

        let mut file = RotatingFile::new(RotationConfig::new(&filename)).unwrap();
        file.write_all(b"first").unwrap();
        file.rotate().unwrap();
        file.write_all(b"second").unwrap();
        file.close().unwrap();
        drop(file);

        assert_eq!(fs::read(&filename).unwrap(), b"second");
        let backups = backups_in(dir.path(), ".log");
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read(&backups[0]).unwrap(), b"first");
    }

    #[test]
    fn test_rotated_files_are_compressed() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");

        let config = RotationConfig::new(&filename)
            .with_max_size(10)
            .with_compress(true);
        let mut file = RotatingFile::new(config).unwrap();

        file.write_all(b"12345678").unwrap();
        file.write_all(b"abcdefgh").unwrap();
        // Dropping waits for the mill to finish.
        drop(file);

        assert!(backups_in(dir.path(), ".log").is_empty());

        let compressed = backups_in(dir.path(), ".log.gz");
        assert_eq!(compressed.len(), 1);

        let mut decoded = String::new();
        GzDecoder::new(File::open(&compressed[0]).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "12345678");
        assert_eq!(fs::read(&filename).unwrap(), b"abcdefgh");
    }

    #[test]
    fn test_max_backups_keeps_newest() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");

        let config = RotationConfig::new(&filename)
            .with_max_size(4)
            .with_max_backups(2);
        let mut file = RotatingFile::new(config).unwrap();

        for record in [b"aaaa", b"bbbb", b"cccc", b"dddd", b"eeee"] {
            file.write_all(record).unwrap();
        }
        drop(file);

        let backups = backups_in(dir.path(), ".log");
        let contents: Vec<_> = backups.iter().map(|path| fs::read(path).unwrap()).collect();

        assert_eq!(contents, vec![b"cccc".to_vec(), b"dddd".to_vec()]);
        assert_eq!(fs::read(&filename).unwrap(), b"eeee");
    }

    #[test]
    fn test_max_age_removes_expired_backups() {
        let dir = tempdir().unwrap();
        let filename = dir.path().join("access.log");

        let stamp = |age: chrono::Duration| {
            (Utc::now().naive_utc() - age)
                .format("%Y-%m-%dT%H-%M-%S%.3f")
                .to_string()
        };
        let expired = dir
            .path()
            .join(format!("access-{}.log", stamp(chrono::Duration::days(30))));
        let expired_gz = dir
            .path()
            .join(format!("access-{}.log.gz", stamp(chrono::Duration::days(20))));
        let recent = dir
            .path()
            .join(format!("access-{}.log", stamp(chrono::Duration::days(1))));
        let unrelated = dir.path().join("notes.txt");

        for path in [&expired, &expired_gz, &recent, &unrelated] {
            fs::write(path, b"x").unwrap();
        }

        let config = RotationConfig::new(&filename)
            .with_max_age(Duration::from_secs(15 * 24 * 60 * 60))
            .with_local_time(false);
        let mut file = RotatingFile::new(config).unwrap();
        file.write_all(b"fresh").unwrap();
        drop(file);

        assert!(!expired.exists());
        assert!(!expired_gz.exists());
        assert!(recent.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = RotatingFile::new(RotationConfig::new("access.log").with_max_size(0));

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
