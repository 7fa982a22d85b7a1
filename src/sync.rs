//! Account-database replication between a host and a shared directory.
//!
//! Each of `passwd`, `group` and `shadow` is modelled as an immutable
//! base (the host's original entries, captured at install time into the
//! base directory) plus an overlay of provisioned entries kept in the
//! shared directory:
//!
//! - `pull` writes base ++ overlay to the system file;
//! - `push` strips the base prefix from the system file and writes the
//!   remainder to the shared directory.
//!
//! Every write goes through a temp file created in the destination
//! directory and renamed into place, so a reader never observes a partial
//! file. `push` refuses to run when the system file no longer starts with
//! the base content instead of silently producing a corrupt overlay.
//!
//! The watch loop is bounded: it stops after a configurable number of
//! consecutive failures, backs off after each failure, and honors an
//! optional cycle limit.

use log::{debug, info, warn};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::config::SyncConfig;
use crate::errors::OpError;

/// The three flat colon-delimited files kept in sync.
pub const SYNCED_FILES: [&str; 3] = ["passwd", "group", "shadow"];

/// Replication direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Shared directory -> system files.
    Pull,
    /// System files -> shared directory.
    Push,
}

/// Replication engine with explicit paths so tests can run against
/// temporary directories.
pub struct SyncEngine {
    system_dir: PathBuf,
    base_dir: PathBuf,
    share_dir: PathBuf,
}

impl SyncEngine {
    pub fn new(config: &SyncConfig, share_dir: &Path) -> Self {
        Self {
            system_dir: PathBuf::from(&config.system_dir),
            base_dir: PathBuf::from(&config.base_dir),
            share_dir: share_dir.to_path_buf(),
        }
    }

    /// Engine with every directory spelled out; used by tests.
    pub fn with_dirs(system_dir: &Path, base_dir: &Path, share_dir: &Path) -> Self {
        Self {
            system_dir: system_dir.to_path_buf(),
            base_dir: base_dir.to_path_buf(),
            share_dir: share_dir.to_path_buf(),
        }
    }

    /// Run one replication pass over all synced files.
    pub fn sync(&self, direction: Direction) -> Result<(), OpError> {
        for name in SYNCED_FILES {
            match direction {
                Direction::Pull => self.pull_one(name)?,
                Direction::Push => self.push_one(name)?,
            }
        }
        Ok(())
    }

    fn pull_one(&self, name: &str) -> Result<(), OpError> {
        let base = fs::read_to_string(self.base_dir.join(name))?;
        let overlay_path = self.share_dir.join(name);
        // A share that has never been pushed to simply contributes
        // nothing yet.
        let overlay = match fs::read_to_string(&overlay_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut combined = base;
        if !combined.ends_with('\n') && !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&overlay);

        write_atomic(&self.system_dir.join(name), &combined, default_mode(name))?;
        debug!("pulled {} ({} bytes)", name, combined.len());
        Ok(())
    }

    fn push_one(&self, name: &str) -> Result<(), OpError> {
        let base = fs::read_to_string(self.base_dir.join(name))?;
        let current = fs::read_to_string(self.system_dir.join(name))?;

        let Some(overlay) = strip_base(&base, &current) else {
            return Err(OpError::Precondition(format!(
                "system file {} no longer starts with its base content; refusing to push",
                name
            )));
        };

        write_atomic(&self.share_dir.join(name), overlay, default_mode(name))?;
        debug!("pushed {} ({} bytes)", name, overlay.len());
        Ok(())
    }

    /// Repeatedly replicate at a fixed interval.
    ///
    /// Stops cleanly after `max_cycles` passes when given, and aborts
    /// after `max_consecutive_failures` back-to-back failed passes. The
    /// sleep doubles after each failure up to eight times the base
    /// interval.
    pub fn watch(
        &self,
        direction: Direction,
        interval: Duration,
        max_cycles: Option<u64>,
        max_consecutive_failures: u32,
    ) -> Result<(), OpError> {
        let mut cycles = 0u64;
        let mut failures = 0u32;
        let mut sleep = interval;

        loop {
            match self.sync(direction) {
                Ok(()) => {
                    failures = 0;
                    sleep = interval;
                }
                Err(e) => {
                    failures += 1;
                    warn!("sync pass failed ({} in a row): {}", failures, e);
                    if failures >= max_consecutive_failures {
                        return Err(OpError::Precondition(format!(
                            "aborting after {} consecutive failed sync passes",
                            failures
                        )));
                    }
                    sleep = (sleep * 2).min(interval * 8);
                }
            }

            cycles += 1;
            if let Some(max) = max_cycles {
                if cycles >= max {
                    info!("completed {} sync cycles, stopping", cycles);
                    return Ok(());
                }
            }
            thread::sleep(sleep);
        }
    }
}

/// The overlay portion of `current`, if it still begins with `base`.
fn strip_base<'a>(base: &str, current: &'a str) -> Option<&'a str> {
    let trimmed_base = base.trim_end_matches('\n');
    let rest = current.strip_prefix(trimmed_base)?;
    if rest.is_empty() {
        Some("")
    } else {
        // Base must end at a line boundary inside the current file.
        rest.strip_prefix('\n')
    }
}

/// Mode for an account file created for the first time. Shadow entries
/// stay root-only; passwd and group must remain world-readable for NSS
/// lookups.
fn default_mode(name: &str) -> u32 {
    if name == "shadow" {
        0o600
    } else {
        0o644
    }
}

/// Write `content` to `path` through a temp file in the same directory,
/// renamed into place. The destination's existing permissions are kept;
/// a new file gets `default_mode`. Temp files start out 0600, which is
/// wrong for the system account files.
fn write_atomic(path: &Path, content: &str, default_mode: u32) -> Result<(), OpError> {
    let dir = path.parent().ok_or_else(|| {
        OpError::Precondition(format!("{} has no parent directory", path.display()))
    })?;
    let mode = match fs::metadata(path) {
        Ok(meta) => meta.permissions().mode() & 0o7777,
        Err(_) => default_mode,
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().set_permissions(fs::Permissions::from_mode(mode))?;
    tmp.persist(path)
        .map_err(|e| OpError::backend("io", e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SyncEngine) {
        let root = TempDir::new().unwrap();
        let system = root.path().join("system");
        let base = root.path().join("base");
        let share = root.path().join("share");
        for dir in [&system, &base, &share] {
            fs::create_dir_all(dir).unwrap();
        }
        for name in SYNCED_FILES {
            fs::write(base.join(name), format!("root:x:0:0:{}\n", name)).unwrap();
        }
        let engine = SyncEngine::with_dirs(&system, &base, &share);
        (root, engine)
    }

    #[test]
    fn test_pull_concatenates_base_and_overlay() {
        let (root, engine) = setup();
        fs::write(
            root.path().join("share/passwd"),
            "alice:x:1001:1001::/home/alice:/bin/bash\n",
        )
        .unwrap();

        engine.sync(Direction::Pull).unwrap();

        let result = fs::read_to_string(root.path().join("system/passwd")).unwrap();
        assert_eq!(
            result,
            "root:x:0:0:passwd\nalice:x:1001:1001::/home/alice:/bin/bash\n"
        );
        // Files with no overlay yet reduce to the base content.
        let group = fs::read_to_string(root.path().join("system/group")).unwrap();
        assert_eq!(group, "root:x:0:0:group\n");
    }

    #[test]
    fn test_push_strips_base_prefix() {
        let (root, engine) = setup();
        for name in SYNCED_FILES {
            fs::write(
                root.path().join("system").join(name),
                format!("root:x:0:0:{}\nbob:x:1002:1002::/home/bob:/bin/sh\n", name),
            )
            .unwrap();
        }

        engine.sync(Direction::Push).unwrap();

        let overlay = fs::read_to_string(root.path().join("share/passwd")).unwrap();
        assert_eq!(overlay, "bob:x:1002:1002::/home/bob:/bin/sh\n");
    }

    #[test]
    fn test_push_refuses_modified_base() {
        let (root, engine) = setup();
        for name in SYNCED_FILES {
            fs::write(
                root.path().join("system").join(name),
                "tampered:x:0:0:\n",
            )
            .unwrap();
        }

        let err = engine.sync(Direction::Push).unwrap_err();
        assert!(matches!(err, OpError::Precondition(_)));
        // Nothing may have been written to the share.
        assert!(!root.path().join("share/passwd").exists());
    }

    #[test]
    fn test_round_trip() {
        let (root, engine) = setup();
        fs::write(
            root.path().join("share/passwd"),
            "alice:x:1001:1001::/home/alice:/bin/bash\n",
        )
        .unwrap();
        fs::write(root.path().join("share/group"), "proj:x:2001:alice\n").unwrap();
        fs::write(root.path().join("share/shadow"), "alice:!:19000::::::\n").unwrap();

        engine.sync(Direction::Pull).unwrap();
        engine.sync(Direction::Push).unwrap();

        let overlay = fs::read_to_string(root.path().join("share/passwd")).unwrap();
        assert_eq!(overlay, "alice:x:1001:1001::/home/alice:/bin/bash\n");
    }

    #[test]
    fn test_pull_keeps_existing_file_permissions() {
        let (root, engine) = setup();
        let passwd = root.path().join("system/passwd");
        fs::write(&passwd, "stale\n").unwrap();
        fs::set_permissions(&passwd, fs::Permissions::from_mode(0o644)).unwrap();

        engine.sync(Direction::Pull).unwrap();

        let mode = fs::metadata(&passwd).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o644, "pull must not strip read permissions from passwd");
    }

    #[test]
    fn test_pull_creates_readable_passwd_and_private_shadow() {
        let (root, engine) = setup();
        engine.sync(Direction::Pull).unwrap();

        let passwd_mode = fs::metadata(root.path().join("system/passwd"))
            .unwrap()
            .permissions()
            .mode()
            & 0o7777;
        let shadow_mode = fs::metadata(root.path().join("system/shadow"))
            .unwrap()
            .permissions()
            .mode()
            & 0o7777;
        assert_eq!(passwd_mode, 0o644);
        assert_eq!(shadow_mode, 0o600);
    }

    #[test]
    fn test_watch_stops_at_cycle_limit() {
        let (root, engine) = setup();
        for name in SYNCED_FILES {
            fs::write(
                root.path().join("system").join(name),
                format!("root:x:0:0:{}\n", name),
            )
            .unwrap();
        }
        engine
            .watch(Direction::Push, Duration::from_millis(1), Some(3), 5)
            .unwrap();
    }

    #[test]
    fn test_watch_aborts_after_consecutive_failures() {
        let (_root, engine) = setup();
        // System files absent: every push pass fails.
        let err = engine
            .watch(Direction::Push, Duration::from_millis(1), None, 3)
            .unwrap_err();
        assert!(matches!(err, OpError::Precondition(_)));
    }

    #[test]
    fn test_strip_base_handles_trailing_newline_variants() {
        assert_eq!(strip_base("a:x\n", "a:x\nb:y\n"), Some("b:y\n"));
        assert_eq!(strip_base("a:x", "a:x\nb:y\n"), Some("b:y\n"));
        assert_eq!(strip_base("a:x\n", "a:x"), Some(""));
        assert_eq!(strip_base("a:x\n", "z:9\n"), None);
    }
}
