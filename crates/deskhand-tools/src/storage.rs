//! Storage for files uploaded through the chat.
//!
//! Photos and documents land in one directory, named
//! `<dd.mm.yy-HH.MM.SS>-<clean name>`, and are handed over to the desktop user
//! (owner and mode 0644) since the bot itself usually runs as root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use deskhand_types::errors::DeskhandError;
use deskhand_types::{ChatTransport, Clock, FileRef, SavedFile};
use tracing::info;
#[cfg(unix)]
use tracing::warn;

use crate::format::file_timestamp;

/// Name used when nothing usable is left of the original file name.
const FALLBACK_NAME: &str = "file";

/// Saves uploads into the configured directory.
pub struct FileStore {
    root: PathBuf,
    owner: Option<String>,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// `owner` is the login name files are chowned to; `None` leaves ownership alone.
    pub fn new(root: impl Into<PathBuf>, owner: Option<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            owner,
            clock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if needed.
    pub async fn ensure_dir(&self) -> Result<(), DeskhandError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            DeskhandError::Storage(format!(
                "failed to create storage directory {}: {e}",
                self.root.display()
            ))
        })
    }

    /// Download `file` through `transport` into the storage directory.
    ///
    /// `default_ext` is appended when the name has no extension (photos arrive
    /// without any name at all).
    pub async fn save(
        &self,
        transport: &dyn ChatTransport,
        file: &FileRef,
        default_ext: &str,
    ) -> Result<SavedFile, DeskhandError> {
        self.ensure_dir().await?;

        let stamp = file_timestamp(self.clock.now().with_timezone(&Local).naive_local());
        let name = safe_file_name(file.file_name.as_deref().unwrap_or(""), default_ext, &stamp);
        let path = self.root.join(name);

        let size = transport.download_file(&file.file_id, &path).await?;
        self.hand_over(&path).await;

        info!(path = %path.display(), size, "upload saved");
        Ok(SavedFile { path, size })
    }

    /// Give the file to the desktop user. Failures are logged, not returned.
    #[cfg(unix)]
    async fn hand_over(&self, path: &Path) {
        use std::os::unix::fs::PermissionsExt;

        if let Some(owner) = &self.owner {
            if let Err(e) = chown_to_user(path, owner) {
                warn!(path = %path.display(), owner = %owner, error = %e, "failed to change owner");
            }
        }
        let perms = std::fs::Permissions::from_mode(0o644);
        if let Err(e) = tokio::fs::set_permissions(path, perms).await {
            warn!(path = %path.display(), error = %e, "failed to set permissions");
        }
    }

    /// Files already belong to the desktop user when the bot runs in their session.
    #[cfg(not(unix))]
    async fn hand_over(&self, path: &Path) {
        tracing::debug!(path = %path.display(), owner = ?self.owner, "ownership left unchanged");
    }
}

#[cfg(unix)]
fn chown_to_user(path: &Path, name: &str) -> Result<(), DeskhandError> {
    use nix::unistd::{chown, User};

    let user = User::from_name(name)
        .map_err(|e| DeskhandError::Storage(format!("user lookup for {name} failed: {e}")))?
        .ok_or_else(|| DeskhandError::Storage(format!("no such user: {name}")))?;
    chown(path, Some(user.uid), Some(user.gid))
        .map_err(|e| DeskhandError::Storage(format!("chown {}: {e}", path.display())))
}

/// Build `<stamp>-<clean name>` from an untrusted file name.
///
/// Only ASCII letters, digits, `_`, whitespace, `.` and `-` survive, so the
/// result can never contain a path separator.
pub fn safe_file_name(original: &str, default_ext: &str, stamp: &str) -> String {
    let cleaned: String = original
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || matches!(c, '_' | '.' | '-'))
        .collect();
    let mut name = cleaned.trim().to_string();
    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }
    if !name.contains('.') && !default_ext.is_empty() {
        name.push_str(default_ext);
    }
    format!("{stamp}-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use deskhand_types::{InboundMessage, OutboundMessage, OutboundPhoto, SystemClock};
    use std::sync::Mutex;

    /// Transport that "downloads" fixed bytes and remembers what it was asked for.
    struct FakeDownloads {
        body: Vec<u8>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatTransport for FakeDownloads {
        async fn send_message(&self, _message: OutboundMessage) -> Result<(), DeskhandError> {
            Ok(())
        }

        async fn send_photo(&self, _photo: OutboundPhoto) -> Result<(), DeskhandError> {
            Ok(())
        }

        async fn download_file(&self, file_id: &str, dest: &Path) -> Result<u64, DeskhandError> {
            self.requested.lock().unwrap().push(file_id.to_string());
            std::fs::write(dest, &self.body).unwrap();
            Ok(self.body.len() as u64)
        }

        async fn health_check(&self) -> Result<(), DeskhandError> {
            Ok(())
        }

        async fn start_listening(
            &self,
        ) -> Result<tokio::sync::mpsc::Receiver<InboundMessage>, DeskhandError> {
            Err(DeskhandError::Internal("not used".to_string()))
        }

        fn restart_polling(&self) {}
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn transport() -> FakeDownloads {
        FakeDownloads {
            body: b"hello".to_vec(),
            requested: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_safe_name_keeps_plain_names() {
        assert_eq!(
            safe_file_name("report v2.pdf", ".jpg", "01.02.24-03.04.05"),
            "01.02.24-03.04.05-report v2.pdf"
        );
    }

    #[test]
    fn test_safe_name_strips_special_characters() {
        assert_eq!(safe_file_name("../../etc/passwd", "", "T"), "T-....etcpasswd");
        assert_eq!(safe_file_name("pic$(rm).png", "", "T"), "T-picrm.png");
        assert_eq!(safe_file_name("отчёт.txt", "", "T"), "T-.txt");
    }

    #[test]
    fn test_safe_name_fallback_and_default_extension() {
        assert_eq!(safe_file_name("", ".jpg", "T"), "T-file.jpg");
        assert_eq!(safe_file_name("@@@", ".jpg", "T"), "T-file.jpg");
        assert_eq!(safe_file_name("notes", ".jpg", "T"), "T-notes.jpg");
        assert_eq!(safe_file_name("notes", "", "T"), "T-notes");
    }

    #[tokio::test]
    async fn test_save_creates_directory_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("inbox").join("nested");
        let store = FileStore::new(&root, None, Arc::new(SystemClock));
        let transport = transport();

        let saved = store
            .save(
                &transport,
                &FileRef {
                    file_id: "abc".to_string(),
                    file_name: Some("notes.txt".to_string()),
                    file_size: Some(5),
                },
                "",
            )
            .await
            .unwrap();

        assert_eq!(saved.size, 5);
        assert!(saved.path.starts_with(&root));
        assert!(saved
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("-notes.txt"));
        assert_eq!(std::fs::read(&saved.path).unwrap(), b"hello");
        assert_eq!(*transport.requested.lock().unwrap(), vec!["abc".to_string()]);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&saved.path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[tokio::test]
    async fn test_save_photo_uses_timestamp_and_default_extension() {
        let dir = tempfile::tempdir().unwrap();
        let at = DateTime::parse_from_rfc3339("2024-05-06T07:08:09Z")
            .unwrap()
            .with_timezone(&Utc);
        let store = FileStore::new(dir.path(), None, Arc::new(FixedClock(at)));

        let saved = store
            .save(
                &transport(),
                &FileRef {
                    file_id: "photo".to_string(),
                    file_name: None,
                    file_size: None,
                },
                ".jpg",
            )
            .await
            .unwrap();

        let expected = format!(
            "{}-file.jpg",
            file_timestamp(at.with_timezone(&Local).naive_local())
        );
        assert_eq!(saved.path, dir.path().join(expected));
    }

    #[tokio::test]
    async fn test_unknown_owner_does_not_fail_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(
            dir.path(),
            Some("deskhand-no-such-user".to_string()),
            Arc::new(SystemClock),
        );

        let saved = store
            .save(
                &transport(),
                &FileRef {
                    file_id: "x".to_string(),
                    file_name: Some("a.bin".to_string()),
                    file_size: None,
                },
                "",
            )
            .await
            .unwrap();
        assert!(saved.path.exists());
    }

    #[tokio::test]
    async fn test_ensure_dir_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();

        let store = FileStore::new(blocker.join("sub"), None, Arc::new(SystemClock));
        let err = store.ensure_dir().await.unwrap_err();
        assert!(matches!(err, DeskhandError::Storage(_)));
    }
}
