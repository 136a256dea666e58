use std::path::Path;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::storage::FileStore;
use super::validation::{UploadError, validate_upload};

/// Which kind of slot an upload is destined for. Each kind owns a fixed
/// storage directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    CategoryIcon,
    ServerIcon,
    ServerBanner,
}

impl AttachmentKind {
    pub fn directory(self) -> &'static str {
        match self {
            Self::CategoryIcon => "category/category_icon",
            Self::ServerIcon => "server/server_icon",
            Self::ServerBanner => "server/server_banner",
        }
    }

    /// Only channel icons are held to the dimension ceiling.
    pub fn checks_dimensions(self) -> bool {
        matches!(self, Self::ServerIcon)
    }
}

/// A named attachment slot on a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub name: &'static str,
    pub kind: AttachmentKind,
}

/// Record types that carry attachment slots.
///
/// `SLOTS` is the fixed list of slots for the type; `slot_path` returns the
/// storage path currently referenced by a slot, if any.
pub trait AttachmentSlots {
    const SLOTS: &'static [Slot];

    fn slot_path(&self, name: &str) -> Option<&str>;

    /// The path held by a slot, treating an empty string as no file.
    fn live_path(&self, name: &str) -> Option<&str> {
        self.slot_path(name).filter(|p| !p.is_empty())
    }
}

/// Raw uploaded file as received from the boundary.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The extension of `filename` including its leading dot, exactly as given.
///
/// The extension starts at the last dot of the final path component. Leading
/// dots never start one, so `.png` and `..png` have no extension.
pub fn file_extension(filename: &str) -> &str {
    let Some(name) = Path::new(filename).file_name().and_then(|n| n.to_str()) else {
        return "";
    };
    match name.rfind('.') {
        Some(dot) if !name[..dot].trim_start_matches('.').is_empty() => &name[dot..],
        _ => "",
    }
}

/// Build a fresh storage path for an upload: `<kind-dir>/<uuid><ext>`.
pub fn generate_path(kind: AttachmentKind, original_filename: &str) -> String {
    format!(
        "{}/{}{}",
        kind.directory(),
        Uuid::new_v4(),
        file_extension(original_filename)
    )
}

/// Paths to release when `incoming` replaces `existing`.
///
/// Creation (`existing` is `None`) releases nothing. On update, every slot
/// whose path changed releases the old path; the incoming path is never
/// returned.
pub fn reconcile_on_save<T: AttachmentSlots>(existing: Option<&T>, incoming: &T) -> Vec<String> {
    let Some(existing) = existing else {
        return Vec::new();
    };

    T::SLOTS
        .iter()
        .filter(|slot| existing.slot_path(slot.name) != incoming.slot_path(slot.name))
        .filter_map(|slot| existing.live_path(slot.name))
        .map(str::to_string)
        .collect()
}

/// Paths to release when `record` is deleted: every slot holding a file.
pub fn reconcile_on_delete<T: AttachmentSlots>(record: &T) -> Vec<String> {
    T::SLOTS
        .iter()
        .filter_map(|slot| record.live_path(slot.name))
        .map(str::to_string)
        .collect()
}

/// Delete released files from the store.
///
/// Best effort: a failed delete is logged and skipped so it never aborts the
/// record operation that released the file.
pub async fn release_files(store: &dyn FileStore, paths: &[String]) {
    for path in paths {
        match store.delete(path).await {
            Ok(()) => debug!(path = %path, "released attachment file"),
            Err(e) => warn!(path = %path, error = %e, "failed to release attachment file"),
        }
    }
}

/// Validate an upload, write it under a fresh path and return that path.
pub async fn store_upload(
    store: &dyn FileStore,
    kind: AttachmentKind,
    upload: &Upload,
) -> Result<String, UploadError> {
    validate_upload(kind, Some(upload))?;

    let path = generate_path(kind, &upload.filename);
    store
        .write(&path, &upload.bytes)
        .await
        .map_err(UploadError::Storage)?;

    info!(path = %path, size = upload.bytes.len(), "stored upload");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CategoryRow, ChannelRow};
    use crate::media::storage::testing::MemoryFileStore;
    use crate::media::validation::tests::png;

    fn channel(icon: Option<&str>, banner: Option<&str>) -> ChannelRow {
        ChannelRow {
            id: 1,
            name: "general".into(),
            owner_id: 1,
            topic: "chat".into(),
            server_id: 1,
            banner: banner.map(String::from),
            icon: icon.map(String::from),
            created_at: "2024-10-17 14:53:00".into(),
        }
    }

    fn category(icon: Option<&str>) -> CategoryRow {
        CategoryRow {
            id: 1,
            name: "Gaming".into(),
            description: None,
            icon: icon.map(String::from),
        }
    }

    #[test]
    fn test_generate_path_layout() {
        let path = generate_path(AttachmentKind::CategoryIcon, "photo.png");
        let rest = path.strip_prefix("category/category_icon/").unwrap();
        let token = rest.strip_suffix(".png").unwrap();
        assert!(Uuid::parse_str(token).is_ok());
    }

    #[test]
    fn test_generate_path_preserves_extension_case() {
        let path = generate_path(AttachmentKind::ServerIcon, "Photo.JPG");
        assert!(path.starts_with("server/server_icon/"));
        assert!(path.ends_with(".JPG"));
    }

    #[test]
    fn test_generate_path_without_extension() {
        let path = generate_path(AttachmentKind::ServerBanner, "banner");
        let token = path.strip_prefix("server/server_banner/").unwrap();
        assert!(Uuid::parse_str(token).is_ok());
    }

    #[test]
    fn test_generate_path_is_unique() {
        let a = generate_path(AttachmentKind::ServerIcon, "a.png");
        let b = generate_path(AttachmentKind::ServerIcon, "a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("dir.d/file"), "");
        assert_eq!(file_extension(".hidden"), "");
        assert_eq!(file_extension("x.Png"), ".Png");
        assert_eq!(file_extension("uploads/icon.gif"), ".gif");
    }

    #[test]
    fn test_file_extension_ignores_leading_dots() {
        assert_eq!(file_extension("..png"), "");
        assert_eq!(file_extension("..."), "");
        assert_eq!(file_extension("uploads/..gif"), "");
        assert_eq!(file_extension("..icon.png"), ".png");
        assert_eq!(file_extension("icon."), ".");
    }

    #[test]
    fn test_save_on_create_releases_nothing() {
        let incoming = channel(
            Some("server/server_icon/a.png"),
            Some("server/server_banner/b.png"),
        );
        assert!(reconcile_on_save(None, &incoming).is_empty());
    }

    #[test]
    fn test_save_unchanged_releases_nothing() {
        let row = channel(
            Some("server/server_icon/a.png"),
            Some("server/server_banner/b.png"),
        );
        assert!(reconcile_on_save(Some(&row), &row.clone()).is_empty());
    }

    #[test]
    fn test_save_icon_replaced_releases_old_icon_only() {
        let existing = channel(Some("icon-a.png"), Some("banner.png"));
        let incoming = channel(Some("icon-b.png"), Some("banner.png"));
        assert_eq!(reconcile_on_save(Some(&existing), &incoming), vec!["icon-a.png"]);
    }

    #[test]
    fn test_save_banner_replaced_keeps_icon() {
        let existing = channel(Some("icon.png"), Some("banner-a.png"));
        let incoming = channel(Some("icon.png"), Some("banner-b.png"));
        assert_eq!(reconcile_on_save(Some(&existing), &incoming), vec!["banner-a.png"]);
    }

    #[test]
    fn test_save_cleared_slot_releases_old() {
        let existing = category(Some("category/category_icon/x.gif"));
        let incoming = category(None);
        assert_eq!(
            reconcile_on_save(Some(&existing), &incoming),
            vec!["category/category_icon/x.gif"]
        );
    }

    #[test]
    fn test_save_first_upload_releases_nothing() {
        let existing = channel(None, None);
        let incoming = channel(Some("icon.png"), None);
        assert!(reconcile_on_save(Some(&existing), &incoming).is_empty());
    }

    #[test]
    fn test_delete_releases_every_live_slot() {
        let row = channel(Some("icon.png"), Some("banner.png"));
        assert_eq!(reconcile_on_delete(&row), vec!["icon.png", "banner.png"]);
        assert!(reconcile_on_delete(&channel(None, None)).is_empty());
        assert!(reconcile_on_delete(&category(Some(""))).is_empty());
    }

    #[tokio::test]
    async fn test_release_files_is_best_effort() {
        let store = MemoryFileStore::failing_deletes();
        // Must not panic or propagate.
        release_files(&store, &["a.png".to_string(), "b.png".to_string()]).await;
        assert!(store.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_store_upload_writes_under_kind_dir() {
        let store = MemoryFileStore::default();
        let upload = Upload {
            filename: "icon.png".into(),
            bytes: png(32, 32),
        };
        let path = store_upload(&store, AttachmentKind::ServerIcon, &upload)
            .await
            .unwrap();
        assert!(path.starts_with("server/server_icon/"));
        assert!(store.contains(&path));
    }

    #[tokio::test]
    async fn test_store_upload_rejects_before_writing() {
        let store = MemoryFileStore::default();
        let upload = Upload {
            filename: "icon.png".into(),
            bytes: png(80, 80),
        };
        let err = store_upload(&store, AttachmentKind::ServerIcon, &upload)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ImageTooLarge));
    }
}
