//! Track content loading from files and URLs

use std::fs;
use std::path::Path;

use crate::utils::errors::OverlayError;

/// Loads subtitle track text from a path or URL.
///
/// Local paths and `file://` URLs read from the filesystem; `http(s)://`
/// sources are fetched with a blocking client when the `http` feature is
/// enabled. The renderer session runs loads on a background thread and
/// marshals the text onto its worker, so a slow fetch never blocks a caller.
#[derive(Debug, Default)]
pub struct ContentsLoader;

impl ContentsLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self
    }

    /// Load track text from `source`.
    pub fn load(&self, source: &str) -> Result<String, OverlayError> {
        if let Some(path) = source.strip_prefix("file://") {
            return self.load_local(Path::new(path));
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return self.load_remote(source);
        }
        self.load_local(Path::new(source))
    }

    fn load_local(&self, path: &Path) -> Result<String, OverlayError> {
        fs::read_to_string(path).map_err(|err| OverlayError::ContentFetch(err.to_string()))
    }

    #[cfg(feature = "http")]
    fn load_remote(&self, url: &str) -> Result<String, OverlayError> {
        let response = reqwest::blocking::get(url)
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| OverlayError::ContentFetch(err.to_string()))?;
        response
            .text()
            .map_err(|err| OverlayError::ContentFetch(err.to_string()))
    }

    #[cfg(not(feature = "http"))]
    fn load_remote(&self, url: &str) -> Result<String, OverlayError> {
        Err(OverlayError::UnsupportedSource(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_local_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "[Script Info]\nTitle: test\n").expect("write");

        let loader = ContentsLoader::new();
        let content = loader
            .load(file.path().to_str().expect("utf8 path"))
            .expect("load");

        assert!(content.starts_with("[Script Info]"));
    }

    #[test]
    fn test_load_file_url() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "Dialogue: 0").expect("write");

        let loader = ContentsLoader::new();
        let url = format!("file://{}", file.path().display());

        assert_eq!(loader.load(&url).expect("load"), "Dialogue: 0");
    }

    #[test]
    fn test_missing_file_is_fetch_error() {
        let loader = ContentsLoader::new();
        let result = loader.load("/nonexistent/subtitles.ass");

        assert!(matches!(result, Err(OverlayError::ContentFetch(_))));
    }

    #[cfg(not(feature = "http"))]
    #[test]
    fn test_http_without_feature_is_unsupported() {
        let loader = ContentsLoader::new();
        let result = loader.load("https://example.com/subs.ass");

        assert!(matches!(result, Err(OverlayError::UnsupportedSource(_))));
    }
}
