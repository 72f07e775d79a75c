//! File name resolution for downloads

use crate::DownloadError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Placeholder that a stem pattern must contain
pub const NAME_PLACEHOLDER: &str = "/name/";

/// Checks that a stem pattern contains the `/name/` placeholder
pub fn validate_stem_pattern(pattern: Option<&str>) -> Result<(), DownloadError> {
    match pattern {
        Some(p) if !p.contains(NAME_PLACEHOLDER) => {
            Err(DownloadError::InvalidStemPattern(p.to_string()))
        }
        _ => Ok(()),
    }
}

/// Rewrites the stem of `filename` with a pattern
///
/// `/name/` in the pattern is replaced with the original stem and the
/// original extension is kept, so `/name/_v2` turns `a.zip` into `a_v2.zip`.
pub fn apply_stem_pattern(filename: &str, pattern: &str) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let new_stem = pattern.replace(NAME_PLACEHOLDER, &stem);

    match path.extension() {
        Some(ext) => format!("{}.{}", new_stem, ext.to_string_lossy()),
        None => new_stem,
    }
}

/// Takes the last path segment of a URL, percent-decoded
///
/// Returns `None` when the URL does not parse or its path ends in a slash.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    let decoded = urlencoding::decode(segment).ok()?;

    // An encoded slash in the segment still separates names
    let name = decoded.rsplit('/').next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Hands out `fileNNNN` placeholder names within one batch
///
/// A name is never given out twice, and names of files that already exist
/// in the directory are skipped.
#[derive(Debug, Default)]
pub struct PlaceholderNames {
    reserved: Mutex<HashSet<PathBuf>>,
}

impl PlaceholderNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next free placeholder name in `dir`
    pub fn reserve(&self, dir: &Path) -> String {
        let mut reserved = match self.reserved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut num: u32 = 1;
        loop {
            let name = format!("file{:04}", num);
            let candidate = dir.join(&name);
            if !reserved.contains(&candidate) && !candidate.exists() {
                reserved.insert(candidate);
                return name;
            }
            num += 1;
        }
    }
}

/// Resolves the final file name of a download
///
/// Uses the explicit name if given, else the URL's last path segment, else a
/// placeholder; then applies the stem pattern.
pub fn resolve_filename(
    url: &str,
    dir: &Path,
    filename: Option<&str>,
    stem_pattern: Option<&str>,
    placeholders: &PlaceholderNames,
) -> String {
    let name = filename
        .map(str::to_string)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| placeholders.reserve(dir));

    match stem_pattern {
        Some(pattern) => apply_stem_pattern(&name, pattern),
        None => name,
    }
}
