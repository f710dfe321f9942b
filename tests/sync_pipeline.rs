use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use sitesync::config::SyncConfig;
use sitesync::error::SyncError;
use sitesync::remote::{AccessPolicy, MemoryStore};
use sitesync::sync::{hash_bytes, SyncEngine};

struct Site {
    source: TempDir,
    scratch: TempDir,
}

impl Site {
    fn new() -> Self {
        Self {
            source: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
        }
    }

    fn write(&self, rel: &str, data: &[u8]) {
        let path = self.source.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn config(&self) -> SyncConfig {
        SyncConfig {
            temp_dir: Some(self.scratch.path().to_path_buf()),
            ..SyncConfig::new(self.source.path())
        }
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().count() == 0
    }
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

fn sorted(mut keys: Vec<String>) -> Vec<String> {
    keys.sort();
    keys
}

fn sample_site() -> Site {
    let site = Site::new();
    site.write("index.html", b"<html><body><h1>Hello</h1></body></html>");
    site.write("css/site.css", "body { color: #333; }\n".repeat(50).as_bytes());
    site.write("js/app.js", b"document.title = 'hi';");
    site.write("img/logo.png", &[0x89, b'P', b'N', b'G', 1, 2, 3, 4]);
    site.write("favicon.ico", &[0, 0, 1, 0]);
    site
}

#[tokio::test]
async fn test_first_run_uploads_every_file() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("www.example.com"));

    let stats = SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(stats.files_discovered, 5);
    assert_eq!(stats.files_uploaded, 5);
    assert_eq!(stats.files_failed, 0);
    assert_eq!(
        sorted(store.put_log()),
        vec!["css/site.css", "favicon.ico", "img/logo.png", "index.html", "js/app.js"]
    );
    assert!(site.scratch_is_empty());
}

#[tokio::test]
async fn test_second_run_uploads_nothing() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("www.example.com"));

    SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();
    let puts_after_first = store.put_log().len();

    let stats = SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(stats.files_skipped, 5);
    assert_eq!(stats.files_uploaded, 0);
    assert_eq!(store.put_log().len(), puts_after_first);
}

#[tokio::test]
async fn test_changed_file_is_uploaded_again() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("b"));
    SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    site.write("js/app.js", b"document.title = 'changed';");
    let stats = SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(stats.files_uploaded, 1);
    assert_eq!(stats.files_skipped, 4);
    assert_eq!(store.put_log().last().map(String::as_str), Some("js/app.js"));
}

#[tokio::test]
async fn test_text_is_gzipped_and_images_are_not() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("b"));

    SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    let css = store.object("css/site.css").unwrap();
    assert_eq!(css.content_encoding.as_deref(), Some("gzip"));
    assert_eq!(css.content_type.as_deref(), Some("text/css"));
    assert_eq!(css.cache_control.as_deref(), Some("max-age=900"));
    assert_eq!(gunzip(&css.data), "body { color: #333; }\n".repeat(50).as_bytes());

    let png = store.object("img/logo.png").unwrap();
    assert_eq!(png.content_encoding, None);
    assert_eq!(png.content_type.as_deref(), Some("image/png"));
    assert_eq!(png.data, vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4]);

    let ico = store.object("favicon.ico").unwrap();
    assert_eq!(ico.content_type.as_deref(), Some("image/x-ico"));
    assert_eq!(ico.content_encoding.as_deref(), Some("gzip"));
}

#[tokio::test]
async fn test_uppercase_image_extension_is_not_compressed() {
    let site = Site::new();
    site.write("photos/HOLIDAY.JPG", b"\xff\xd8\xff raw jpeg");
    let store = Arc::new(MemoryStore::new("b"));

    SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    let object = store.object("photos/HOLIDAY.JPG").unwrap();
    assert_eq!(object.content_encoding, None);
    assert_eq!(object.content_type.as_deref(), Some("image/jpeg"));
}

#[tokio::test]
async fn test_unknown_extension_falls_back() {
    let site = Site::new();
    site.write("data/archive.xyz", b"plain bytes");
    site.write("LICENSE", b"MIT");
    let store = Arc::new(MemoryStore::new("b"));

    let stats = SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(stats.files_uploaded, 2);
    for key in ["data/archive.xyz", "LICENSE"] {
        let object = store.object(key).unwrap();
        assert_eq!(object.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(object.content_encoding.as_deref(), Some("gzip"));
    }
}

#[tokio::test]
async fn test_nested_keys_use_forward_slashes() {
    let site = Site::new();
    site.write("a/b/c/deep.html", b"<p>deep</p>");
    let store = Arc::new(MemoryStore::new("b"));

    SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(store.keys(), vec!["a/b/c/deep.html"]);
}

#[tokio::test]
async fn test_remote_checksum_of_compressed_body_is_skipped() {
    let site = Site::new();
    site.write("index.html", b"<html>same</html>");
    let store = Arc::new(MemoryStore::new("b"));

    SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();
    let stored = store.object("index.html").unwrap();

    // The bucket holds the gzip bytes, so its checksum is that of the gzip copy.
    let fresh = Arc::new(MemoryStore::new("b"));
    fresh.insert_raw("index.html", stored.data.clone());
    assert_ne!(hash_bytes(&stored.data), hash_bytes(b"<html>same</html>"));

    let stats = SyncEngine::new(fresh.clone(), site.config()).sync().await.unwrap();
    assert_eq!(stats.files_skipped, 1);
    assert!(fresh.put_log().is_empty());
}

#[tokio::test]
async fn test_failed_upload_does_not_stop_the_run() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("b").fail_on("js/app.js"));

    let stats = SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.files_uploaded, 4);
    assert!(!store.put_log().contains(&"js/app.js".to_string()));
    assert!(site.scratch_is_empty());
}

#[tokio::test]
async fn test_small_queue_still_delivers_every_file() {
    let site = Site::new();
    for i in 0..40 {
        site.write(&format!("pages/page{:02}.html", i), format!("<p>{}</p>", i).as_bytes());
    }
    let store = Arc::new(MemoryStore::new("b").with_put_delay(Duration::from_millis(2)));
    let config = SyncConfig {
        workers: 3,
        queue_capacity: 1,
        ..site.config()
    };

    let stats = SyncEngine::new(store.clone(), config).sync().await.unwrap();

    assert_eq!(stats.files_discovered, 40);
    assert_eq!(stats.files_uploaded, 40);
    let log = store.put_log();
    assert_eq!(log.len(), 40);
    let mut unique = log.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 40);
}

#[tokio::test]
async fn test_single_worker_drains_queue() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("b"));
    let config = SyncConfig {
        workers: 1,
        queue_capacity: 1,
        ..site.config()
    };

    let stats = SyncEngine::new(store.clone(), config).sync().await.unwrap();

    assert_eq!(stats.files_processed(), 5);
}

#[tokio::test]
async fn test_empty_tree() {
    let site = Site::new();
    let store = Arc::new(MemoryStore::new("b"));

    let stats = SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(stats.files_discovered, 0);
    assert!(store.put_log().is_empty());
}

#[tokio::test]
async fn test_missing_source_root_is_fatal() {
    let store = Arc::new(MemoryStore::new("b"));
    let config = SyncConfig::new(Path::new("/definitely/not/a/site"));

    let err = SyncEngine::new(store.clone(), config).sync().await.unwrap_err();

    assert!(matches!(err, SyncError::SourceRoot { .. }));
    assert!(store.put_log().is_empty());
}

#[tokio::test]
async fn test_bucket_created_public_read() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("b"));

    SyncEngine::new(store.clone(), site.config()).sync().await.unwrap();

    assert_eq!(store.bucket_acl(), Some(AccessPolicy::PublicRead));
    assert_eq!(
        store.object("index.html").unwrap().acl,
        Some(AccessPolicy::PublicRead)
    );
}

#[tokio::test]
async fn test_dry_run_uploads_nothing() {
    let site = sample_site();
    let store = Arc::new(MemoryStore::new("b"));
    let config = SyncConfig {
        dry_run: true,
        ..site.config()
    };

    let stats = SyncEngine::new(store.clone(), config).sync().await.unwrap();

    assert_eq!(stats.files_pending, 5);
    assert!(store.put_log().is_empty());
    assert_eq!(store.bucket_acl(), None);
    assert!(site.scratch_is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_subdirectory_aborts_the_run() {
    use std::os::unix::fs::PermissionsExt;

    let site = sample_site();
    for i in 0..20 {
        site.write(&format!("blog/post{:02}.html", i), b"<article>post</article>");
    }
    site.write("drafts/wip.html", b"<p>draft</p>");
    let locked = site.source.path().join("drafts");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::read_dir(&locked).is_ok() {
        // Permission bits are not enforced for this user (root).
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }
    let store = Arc::new(MemoryStore::new("b").with_put_delay(Duration::from_millis(5)));

    let result = SyncEngine::new(store.clone(), site.config()).sync().await;
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(result, Err(SyncError::Walk { .. })), "got {:?}", result);
    assert!(!store.put_log().contains(&"drafts/wip.html".to_string()));
    assert!(site.scratch_is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_source_root_uses_real_tree() {
    let site = sample_site();
    let links = TempDir::new().unwrap();
    let public = links.path().join("public");
    std::os::unix::fs::symlink(site.source.path(), &public).unwrap();
    let store = Arc::new(MemoryStore::new("b"));
    let config = SyncConfig {
        source_root: public,
        ..site.config()
    };

    let stats = SyncEngine::new(store.clone(), config).sync().await.unwrap();

    assert_eq!(stats.files_uploaded, 5);
    assert_eq!(
        sorted(store.put_log()),
        vec!["css/site.css", "favicon.ico", "img/logo.png", "index.html", "js/app.js"]
    );
}
