//! Test ROM corpus discovery and ordering.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::error::{CorpusNamingError, Error, Result};

/// Default ROM file extension.
pub const DEFAULT_EXTENSION: &str = "nes";

/// Default screenshot file extension.
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

static SORT_KEY_PATTERN: OnceLock<Regex> = OnceLock::new();

fn sort_key_pattern() -> &'static Regex {
    SORT_KEY_PATTERN.get_or_init(|| Regex::new(r"^(\d+)").expect("valid sort key regex"))
}

/// One test ROM and where its screenshot goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub path: PathBuf,
    /// File name (e.g. `"01-basics.nes"`).
    pub name: String,
    /// File name without extension.
    pub stem: String,
    /// Numeric filename prefix that orders the corpus.
    pub sort_key: u64,
    pub output_image_path: PathBuf,
}

/// Parse the leading decimal digits of a file name.
///
/// # Errors
///
/// Fails if the name does not start with a digit or the number overflows.
pub fn parse_sort_key(name: &str) -> std::result::Result<u64, String> {
    let digits = sort_key_pattern()
        .captures(name)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| "name does not start with a numeric ordering prefix".to_string())?;
    digits
        .as_str()
        .parse()
        .map_err(|e| format!("ordering prefix {:?} is not a number: {e}", digits.as_str()))
}

/// Where to look for ROMs and where screenshots go.
#[derive(Debug, Clone)]
pub struct CorpusLayout {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub extension: String,
    pub image_extension: String,
    /// Only keep files whose name contains this substring.
    pub filter: Option<String>,
}

impl Default for CorpusLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("blargg"),
            output_dir: PathBuf::from("screenshots"),
            extension: DEFAULT_EXTENSION.to_string(),
            image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            filter: None,
        }
    }
}

impl CorpusLayout {
    /// Build a corpus entry for `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`CorpusNamingError`] if the file name has no ordering prefix.
    pub fn entry(&self, path: &Path) -> std::result::Result<CorpusEntry, CorpusNamingError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let naming_error = |reason: String| CorpusNamingError {
            path: path.to_path_buf(),
            name: name.clone(),
            reason,
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| naming_error("file name is not valid UTF-8".to_string()))?
            .to_string();
        let sort_key = parse_sort_key(&stem).map_err(naming_error)?;
        let output_image_path = self
            .output_dir
            .join(format!("{stem}.{}", self.image_extension));

        Ok(CorpusEntry {
            path: path.to_path_buf(),
            name,
            stem,
            sort_key,
            output_image_path,
        })
    }

    fn matches(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
            return false;
        }
        match (&self.filter, path.file_name().and_then(|n| n.to_str())) {
            (Some(filter), Some(name)) => name.contains(filter.as_str()),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Discovered corpus: runnable entries in order, plus rejected files.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub entries: Vec<CorpusEntry>,
    pub rejected: Vec<CorpusNamingError>,
}

impl Corpus {
    /// Order entries by numeric prefix, then by name for equal prefixes.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.name.cmp(&b.name)));
        self.rejected.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// List ROMs in the corpus root (non-recursively) in execution order.
///
/// # Errors
///
/// Returns [`Error::CorpusNotFound`] if the root is not a directory, or an
/// IO error if it cannot be listed.
pub fn discover(layout: &CorpusLayout) -> Result<Corpus> {
    if !layout.root.is_dir() {
        return Err(Error::CorpusNotFound(layout.root.clone()));
    }

    let mut corpus = Corpus::default();
    for dir_entry in fs::read_dir(&layout.root)? {
        let path = dir_entry?.path();
        if !layout.matches(&path) {
            continue;
        }
        match layout.entry(&path) {
            Ok(entry) => corpus.entries.push(entry),
            Err(e) => {
                warn!("skipping corpus file {e}");
                corpus.rejected.push(e);
            }
        }
    }
    corpus.sort();

    info!(
        root = %layout.root.display(),
        entries = corpus.entries.len(),
        rejected = corpus.rejected.len(),
        "discovered corpus"
    );
    Ok(corpus)
}

/// Create the screenshot directory if it does not exist.
///
/// # Errors
///
/// Returns [`Error::OutputDir`] if the directory cannot be created.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::OutputDir {
        path: dir.to_path_buf(),
        source,
    })
}
