//! Font configuration for the layout engine
//!
//! Defines where fonts and the font cache live, fallbacks for missing fonts,
//! and which font provider the engine should use. Configuration runs once on
//! the session worker before the first frame is rendered.

use std::fs;
use std::path::{Path, PathBuf};

use crate::library::{LibraryHandle, LibraryWrapper, RendererHandle};
use crate::utils::errors::OverlayError;

const FONTS_CACHE_DIR_NAME: &str = "fonts-cache";
const FONTS_CONF_FILE_NAME: &str = "fonts.conf";

/// Which provider the engine uses for font lookup and character rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontProvider {
    /// Let the engine pick the platform provider.
    Autodetect,
    /// [fontconfig](https://www.freedesktop.org/wiki/Software/fontconfig/)
    /// font management.
    Fontconfig,
    /// CoreText system fonts (Apple platforms).
    CoreText,
}

impl FontProvider {
    /// The engine's numeric value for this provider.
    pub fn engine_value(self) -> i32 {
        match self {
            Self::Autodetect => 1,
            Self::CoreText => 2,
            Self::Fontconfig => 3,
        }
    }
}

/// Fonts configuration: font directory, cache location, fallback font and
/// family, and the default provider.
#[derive(Debug, Clone)]
pub struct FontConfig {
    fonts_path: PathBuf,
    fonts_cache_path: Option<PathBuf>,
    default_font: Option<String>,
    default_family: Option<String>,
    provider: FontProvider,
}

impl FontConfig {
    /// Create a configuration rooted at `fonts_path` (may be read-only).
    ///
    /// The cache and generated `fonts.conf` default to living next to the
    /// fonts directory; see [`FontConfig::fonts_cache_path`] for a writable
    /// override.
    pub fn new(fonts_path: impl Into<PathBuf>) -> Self {
        Self {
            fonts_path: fonts_path.into(),
            fonts_cache_path: None,
            default_font: None,
            default_family: None,
            provider: FontProvider::Fontconfig,
        }
    }

    /// Writable directory for the font cache; `fonts-cache/` is appended.
    pub fn fonts_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fonts_cache_path = Some(path.into());
        self
    }

    /// Fallback font file name from the fonts directory.
    pub fn default_font(mut self, font: impl Into<String>) -> Self {
        self.default_font = Some(font.into());
        self
    }

    /// Fallback font family.
    pub fn default_family(mut self, family: impl Into<String>) -> Self {
        self.default_family = Some(family.into());
        self
    }

    /// Font provider; defaults to fontconfig.
    pub fn provider(mut self, provider: FontProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Write the cache directory and `fonts.conf`, then hand both to the
    /// engine along with the fallback font settings.
    pub fn configure(
        &self,
        wrapper: &mut dyn LibraryWrapper,
        library: LibraryHandle,
        renderer: RendererHandle,
    ) -> Result<(), OverlayError> {
        self.make_cache_directory()?;
        let conf_path = self.write_fonts_conf()?;

        wrapper.set_extract_fonts(library, true);
        wrapper.set_fonts(
            renderer,
            self.provider,
            Some(&conf_path),
            self.default_font.as_deref(),
            self.default_family.as_deref(),
        );
        Ok(())
    }

    fn cache_dir(&self) -> PathBuf {
        self.fonts_cache_path
            .as_deref()
            .unwrap_or(&self.fonts_path)
            .join(FONTS_CACHE_DIR_NAME)
    }

    fn conf_path(&self) -> PathBuf {
        self.fonts_cache_path
            .as_deref()
            .unwrap_or(&self.fonts_path)
            .join(FONTS_CONF_FILE_NAME)
    }

    fn make_cache_directory(&self) -> Result<(), OverlayError> {
        let dir = self.cache_dir();
        if !dir.is_dir() {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    fn write_fonts_conf(&self) -> Result<PathBuf, OverlayError> {
        let path = self.conf_path();
        fs::write(&path, self.fonts_conf_contents())?;
        Ok(path)
    }

    fn fonts_conf_contents(&self) -> String {
        fonts_conf(&self.fonts_path, &self.cache_dir())
    }
}

/// fontconfig XML pointing the engine at the font and cache directories.
///
/// Carries the generic-family aliases (`mono`, `sans serif`, `sans`) tracks
/// commonly reference, and a 30s rescan interval.
fn fonts_conf(fonts_dir: &Path, cache_dir: &Path) -> String {
    format!(
        r#"<?xml version="1.0"?>
<!DOCTYPE fontconfig SYSTEM "fonts.dtd">
<fontconfig>
    <dir>{fonts}</dir>
    <cachedir>{cache}</cachedir>
    <match target="pattern">
        <test qual="any" name="family">
            <string>mono</string>
        </test>
        <edit name="family" mode="assign" binding="same">
            <string>monospace</string>
        </edit>
    </match>
    <match target="pattern">
        <test qual="any" name="family">
            <string>sans serif</string>
        </test>
        <edit name="family" mode="assign" binding="same">
            <string>sans-serif</string>
        </edit>
    </match>
    <match target="pattern">
        <test qual="any" name="family">
            <string>sans</string>
        </test>
        <edit name="family" mode="assign" binding="same">
            <string>sans-serif</string>
        </edit>
    </match>
    <config>
        <rescan>
            <int>30</int>
        </rescan>
    </config>
</fontconfig>
"#,
        fonts = fonts_dir.display(),
        cache = cache_dir.display(),
    )
}
