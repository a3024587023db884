use blog_portal::storage::{LocalDiskStorage, MockStorageService, StorageService};
use uuid::Uuid;

fn temp_root() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("blog-portal-test-{}", Uuid::new_v4()))
}

#[cfg(test)]
mod disk_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_image_writes_file_and_returns_serving_path() {
        let root = temp_root();
        let storage = LocalDiskStorage::new(root.clone(), "/uploads");
        storage.ensure_upload_dir().await;

        let data = vec![0x89, 0x50, 0x4e, 0x47];
        let path = storage.save_image("cover.PNG", &data).await.unwrap();

        // Relative serving path with a normalized extension.
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".png"));

        // The bytes landed inside the upload root, under the generated name.
        let object_name = path.rsplit('/').next().unwrap();
        let written = tokio::fs::read(root.join(object_name)).await.unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn test_client_filename_cannot_traverse_paths() {
        let root = temp_root();
        let storage = LocalDiskStorage::new(root.clone(), "/uploads");
        storage.ensure_upload_dir().await;

        let path = storage
            .save_image("../../etc/passwd", b"nope")
            .await
            .unwrap();

        // The stored name is server-generated, the hostile extension
        // collapses to "bin", and nothing escapes the root.
        assert!(!path.contains(".."));
        assert!(path.ends_with(".bin"));
        let object_name = path.rsplit('/').next().unwrap();
        assert!(root.join(object_name).exists());
    }

    #[tokio::test]
    async fn test_missing_extension_defaults_to_bin() {
        let root = temp_root();
        let storage = LocalDiskStorage::new(root, "/uploads");
        storage.ensure_upload_dir().await;

        let path = storage.save_image("no_extension", b"data").await.unwrap();
        assert!(path.ends_with(".bin"));
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let result = mock.save_image("photo.jpg", b"bytes").await;
        assert!(result.is_ok());

        let path = result.unwrap();
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.save_image("photo.jpg", b"bytes").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_sanitizes_extension() {
        let mock = MockStorageService::new();
        let path = mock.save_image("../../etc/passwd", b"x").await.unwrap();
        assert!(!path.contains(".."));
        assert!(path.ends_with(".bin"));
    }
}
