use cms_portal::storage::{
    FsMediaStorage, MediaStorage, MockMediaStorage, content_type_for_key, image_key,
};

#[cfg(test)]
mod fs_tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir fail");
        let store = FsMediaStorage::new(dir.path());

        store.put("images/cover.png", b"png bytes").await.unwrap();
        let fetched = store.get("images/cover.png").await.unwrap();
        assert_eq!(fetched.as_deref(), Some(&b"png bytes"[..]));

        // The object sits under the configured root.
        assert!(dir.path().join("images/cover.png").is_file());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempfile::tempdir().expect("tempdir fail");
        let store = FsMediaStorage::new(dir.path());
        assert!(store.get("images/nothing.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir fail");
        let store = FsMediaStorage::new(dir.path());

        store.put("images/cover.png", b"png bytes").await.unwrap();
        store.remove("images/cover.png").await.unwrap();
        assert!(store.get("images/cover.png").await.unwrap().is_none());

        // A second removal of the same key is fine.
        store.remove("images/cover.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_traversal_segments_are_stripped() {
        let dir = tempfile::tempdir().expect("tempdir fail");
        let store = FsMediaStorage::new(dir.path());

        store.put("../../etc/passwd", b"not really").await.unwrap();

        // The navigation segments are dropped, keeping the file inside the root.
        assert!(dir.path().join("etc/passwd").is_file());
        assert!(!dir.path().parent().unwrap().join("etc/passwd").exists());

        // Reads sanitize the same way, so the roundtrip still works.
        let fetched = store.get("../../etc/passwd").await.unwrap();
        assert_eq!(fetched.as_deref(), Some(&b"not really"[..]));
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_roundtrip() {
        let mock = MockMediaStorage::new();
        mock.put("images/a.png", b"bytes").await.unwrap();
        assert_eq!(
            mock.get("images/a.png").await.unwrap().as_deref(),
            Some(&b"bytes"[..])
        );

        mock.remove("images/a.png").await.unwrap();
        assert!(mock.get("images/a.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_failure_mode() {
        let mock = MockMediaStorage::new_failing();
        assert!(mock.put("images/a.png", b"bytes").await.is_err());
        assert!(mock.get("images/a.png").await.is_err());
        assert!(mock.remove("images/a.png").await.is_err());
    }
}

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_image_key_uses_validated_type_for_extension() {
        assert!(image_key("image/png").ends_with(".png"));
        assert!(image_key("image/jpeg").ends_with(".jpg"));
        assert!(image_key("image/webp; charset=binary").ends_with(".webp"));
        assert!(image_key("application/zip").ends_with(".bin"));
        assert!(image_key("image/png").starts_with("images/"));

        // Every key is unique even for the same type.
        assert_ne!(image_key("image/png"), image_key("image/png"));
    }

    #[test]
    fn test_content_type_for_key_maps_back() {
        assert_eq!(content_type_for_key("images/a.png"), "image/png");
        assert_eq!(content_type_for_key("images/a.jpg"), "image/jpeg");
        assert_eq!(content_type_for_key("images/a.gif"), "image/gif");
        assert_eq!(content_type_for_key("images/a.webp"), "image/webp");
        assert_eq!(content_type_for_key("weird"), "application/octet-stream");
    }
}
