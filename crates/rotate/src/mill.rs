//! Naming of rotated files and the background pass that prunes and compresses
//! them.

use crate::config::RotationConfig;
use crate::error::{Error, Result};

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use flume::{Sender, TrySendError};

const BACKUP_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const COMPRESS_SUFFIX: &str = ".gz";

/// Splits `access.log` into (`access`, `.log`).
fn prefix_and_ext(filename: &Path) -> (String, String) {
    let name = filename
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match name.rfind('.') {
        Some(idx) if idx > 0 => (format!("{}-", &name[..idx]), name[idx..].to_string()),
        _ => (format!("{name}-"), String::new()),
    }
}

pub(crate) fn now(local_time: bool) -> NaiveDateTime {
    if local_time {
        Local::now().naive_local()
    } else {
        Utc::now().naive_utc()
    }
}

/// Picks a backup path for `filename` stamped with `timestamp`, moving the
/// stamp forward a millisecond at a time until the name is free.
pub(crate) fn backup_path(filename: &Path, mut timestamp: NaiveDateTime) -> PathBuf {
    let dir = filename.parent().unwrap_or_else(|| Path::new(""));
    let (prefix, ext) = prefix_and_ext(filename);

    loop {
        let name = format!("{prefix}{}{ext}", timestamp.format(BACKUP_TIME_FORMAT));
        let candidate = dir.join(&name);
        let compressed = dir.join(format!("{name}{COMPRESS_SUFFIX}"));

        if !candidate.exists() && !compressed.exists() {
            return candidate;
        }

        timestamp += ChronoDuration::milliseconds(1);
    }
}

/// A rotated file found next to the active one.
#[derive(Debug)]
struct Backup {
    path: PathBuf,
    timestamp: NaiveDateTime,
    compressed: bool,
}

fn parse_backup(name: &str, prefix: &str, ext: &str) -> Option<(NaiveDateTime, bool)> {
    let (stem, compressed) = match name.strip_suffix(COMPRESS_SUFFIX) {
        Some(stem) => (stem, true),
        None => (name, false),
    };

    let stamp = stem.strip_prefix(prefix)?.strip_suffix(ext)?;
    let timestamp = NaiveDateTime::parse_from_str(stamp, BACKUP_TIME_FORMAT).ok()?;

    Some((timestamp, compressed))
}

/// Rotated files for `filename`, newest first.
fn backups(filename: &Path) -> Result<Vec<Backup>> {
    let dir = match filename.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let (prefix, ext) = prefix_and_ext(filename);

    let entries = fs::read_dir(dir).map_err(|e| Error::Io("failed to read log directory", e))?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Io("failed to read log directory entry", e))?;

        let is_file = entry
            .file_type()
            .map_err(|e| Error::Io("failed to stat log directory entry", e))?
            .is_file();
        if !is_file {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if let Some((timestamp, compressed)) = parse_backup(name, &prefix, &ext) {
            found.push(Backup {
                path: entry.path(),
                timestamp,
                compressed,
            });
        }
    }

    found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    Ok(found)
}

fn compress(source: &Path) -> Result<()> {
    let mut target_name = source.as_os_str().to_owned();
    target_name.push(COMPRESS_SUFFIX);
    let target = PathBuf::from(target_name);

    let result = (|| -> io::Result<()> {
        let mut input = File::open(source)?;
        let output = File::create(&target)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        io::copy(&mut input, &mut encoder)?;
        encoder.finish()?.sync_all()
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&target);
        return Err(Error::Io("failed to compress rotated log", e));
    }

    fs::remove_file(source).map_err(|e| Error::Io("failed to remove compressed log", e))
}

/// One prune-and-compress pass over the rotated files of `config.filename`.
pub(crate) fn run_once(config: &RotationConfig) -> Result<()> {
    if config.max_age.is_none() && config.max_backups.is_none() && !config.compress {
        return Ok(());
    }

    let mut remaining = backups(&config.filename)?;
    let mut remove = Vec::new();

    if let Some(max_backups) = config.max_backups {
        if remaining.len() > max_backups {
            remove.extend(remaining.split_off(max_backups));
        }
    }

    if let Some(max_age) = config.max_age {
        let max_age = ChronoDuration::from_std(max_age).unwrap_or(ChronoDuration::MAX);
        let cutoff = now(config.local_time)
            .checked_sub_signed(max_age)
            .unwrap_or(NaiveDateTime::MIN);

        let (keep, expired): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|backup| backup.timestamp >= cutoff);
        remaining = keep;
        remove.extend(expired);
    }

    for backup in &remove {
        if let Err(e) = fs::remove_file(&backup.path) {
            if e.kind() != io::ErrorKind::NotFound {
                return Err(Error::Io("failed to remove expired log", e));
            }
        }
    }

    if config.compress {
        for backup in remaining.iter().filter(|backup| !backup.compressed) {
            compress(&backup.path)?;
        }
    }

    Ok(())
}

/// Background thread that runs [`run_once`] on request.
///
/// Requests are coalesced: while one is pending, further requests are folded
/// into it.
#[derive(Debug)]
pub(crate) struct Mill {
    sender: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Mill {
    pub(crate) fn spawn(config: RotationConfig) -> Result<Self> {
        let (sender, receiver) = flume::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("logroll-mill".to_string())
            .spawn(move || {
                while receiver.recv().is_ok() {
                    // Not routed through tracing: this runs underneath the logger.
                    if let Err(e) = run_once(&config) {
                        eprintln!("logroll-rotate: {e}");
                    }
                }
            })
            .map_err(|e| Error::Io("failed to spawn mill thread", e))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    pub(crate) fn request(&self) {
        if let Some(sender) = &self.sender {
            match sender.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Disconnected(())) => {
                    eprintln!("logroll-rotate: mill thread is gone");
                }
            }
        }
    }
}

impl Drop for Mill {
    fn drop(&mut self) {
        self.sender.take();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                eprintln!("logroll-rotate: mill thread panicked");
            }
        }
    }
}
