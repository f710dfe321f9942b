//! Content classification by file extension.
//!
//! Maps an extension to the MIME type sent as `Content-Type` and decides
//! whether the file is worth gzipping before upload. Lookups are
//! case-sensitive, matching the upper-case image variants explicitly.

use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Content type used when the extension has no table entry.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("ico", "image/x-ico"),
    ("js", "text/javascript"),
    ("jpg", "image/jpeg"),
    ("JPG", "image/jpeg"),
    ("gif", "image/gif"),
    ("GIF", "image/gif"),
    ("png", "image/png"),
    ("PNG", "image/png"),
];

// Already-compressed image formats. Everything else gets gzipped.
const PRECOMPRESSED: &[&str] = &["jpg", "gif", "png", "JPG", "GIF", "PNG"];

/// Result of classifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub content_type: String,
    pub compressible: bool,
    /// False when `content_type` is the fallback.
    pub recognized: bool,
}

/// Immutable extension table, built once and shared by every worker.
#[derive(Debug, Clone)]
pub struct ContentTable {
    types: HashMap<String, String>,
    precompressed: HashSet<String>,
}

impl Default for ContentTable {
    fn default() -> Self {
        Self {
            types: CONTENT_TYPES
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
                .collect(),
            precompressed: PRECOMPRESSED.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

impl ContentTable {
    /// Classify a path by its file-name extension.
    ///
    /// A name without an extension is treated like an unknown extension:
    /// fallback content type, compressible.
    pub fn classify(&self, path: &Path) -> Classification {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let compressible = !self.precompressed.contains(ext);
        match self.types.get(ext) {
            Some(mime) => Classification {
                content_type: mime.clone(),
                compressible,
                recognized: true,
            },
            None => Classification {
                content_type: FALLBACK_CONTENT_TYPE.to_string(),
                compressible,
                recognized: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_assets_are_compressible() {
        let table = ContentTable::default();

        let css = table.classify(Path::new("/site/style.css"));
        assert_eq!(css.content_type, "text/css");
        assert!(css.compressible);
        assert!(css.recognized);

        let html = table.classify(Path::new("/site/index.htm"));
        assert_eq!(html.content_type, "text/html");
        assert!(html.compressible);

        let js = table.classify(Path::new("assets/app.js"));
        assert_eq!(js.content_type, "text/javascript");
        assert!(js.compressible);
    }

    #[test]
    fn test_images_are_not_compressed() {
        let table = ContentTable::default();

        for name in ["photo.jpg", "photo.JPG", "anim.gif", "anim.GIF", "logo.png", "logo.PNG"] {
            let class = table.classify(Path::new(name));
            assert!(!class.compressible, "{} should not be compressed", name);
            assert!(class.recognized);
            assert!(class.content_type.starts_with("image/"));
        }
    }

    #[test]
    fn test_favicon_is_compressed() {
        let class = ContentTable::default().classify(Path::new("favicon.ico"));
        assert_eq!(class.content_type, "image/x-ico");
        assert!(class.compressible);
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        let class = ContentTable::default().classify(Path::new("data.xyz"));
        assert_eq!(class.content_type, FALLBACK_CONTENT_TYPE);
        assert!(!class.recognized);
        assert!(class.compressible);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        // Only the image types carry upper-case entries.
        let class = ContentTable::default().classify(Path::new("STYLE.CSS"));
        assert_eq!(class.content_type, FALLBACK_CONTENT_TYPE);
        assert!(class.compressible);
    }

    #[test]
    fn test_extension_comes_from_file_name() {
        let table = ContentTable::default();

        let class = table.classify(Path::new("/site/v1.2/LICENSE"));
        assert!(!class.recognized);

        let class = table.classify(Path::new("/site/.well-known/README"));
        assert_eq!(class.content_type, FALLBACK_CONTENT_TYPE);
    }
}
