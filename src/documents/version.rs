//! Filename-based version codec.
//!
//! A physical version file is named `<base>[.v<N>]<ext>`. A name without the
//! `.v<N>` suffix is version 1. Version 1 may also be written with an explicit
//! `.v1` suffix: both encodings parse to the same [`VersionTag`], so the codec
//! is intentionally not a bijection at version 1. [`format`] always produces
//! the unsuffixed form for version 1; [`format_explicit`] produces the
//! suffixed form that the store migrates to on the first update.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Marker between the base name and the version number.
const VERSION_MARKER: &str = ".v";

/// Version number, base name and extension derived from a filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionTag {
    /// Base name with the version suffix and extension removed.
    pub base: String,
    /// Version number, always `>= 1`.
    pub version: u32,
    /// Extension including the leading dot, or empty.
    pub extension: String,
}

/// How the version number was written in the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionEncoding {
    /// No `.v<N>` suffix; the name denotes version 1.
    Implicit,
    /// The name carries an explicit `.v<N>` suffix.
    Explicit,
}

/// A [`VersionTag`] together with the encoding it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedName {
    pub tag: VersionTag,
    pub encoding: VersionEncoding,
}

impl ParsedName {
    pub fn is_explicit(&self) -> bool {
        self.encoding == VersionEncoding::Explicit
    }
}

/// Identity of one conceptual document across all of its versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalKey {
    /// Directory relative to the storage root, `/`-separated.
    pub directory: String,
    pub base: String,
    pub extension: String,
}

impl LogicalKey {
    pub fn new(
        directory: impl Into<String>,
        base: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            base: base.into(),
            extension: extension.into(),
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.directory.is_empty() {
            write!(f, "{}{}", self.base, self.extension)
        } else {
            write!(f, "{}/{}{}", self.directory, self.base, self.extension)
        }
    }
}

impl VersionTag {
    /// Logical key of this tag when the file lives in `directory`.
    pub fn logical_key(&self, directory: impl Into<String>) -> LogicalKey {
        LogicalKey::new(directory, self.base.clone(), self.extension.clone())
    }

    /// Canonical filename for this tag (unsuffixed at version 1).
    pub fn file_name(&self) -> String {
        format(&self.base, self.version, &self.extension)
    }
}

/// Parse a path or filename into its version tag. Never fails.
pub fn parse(path: impl AsRef<Path>) -> VersionTag {
    parse_name(path).tag
}

/// Parse a path or filename, keeping track of the version encoding.
///
/// Only the final path component is considered. A stem ending in
/// `.v<digits>` with a value in `1..=u32::MAX` is a version suffix; leading
/// zeros are accepted (`x.v007.md` is version 7). `.v0` and numbers that do
/// not fit in a `u32` are not suffixes and stay part of the base name.
pub fn parse_name(path: impl AsRef<Path>) -> ParsedName {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, extension) = split_extension(&file_name);

    if let Some((base, version)) = split_version_suffix(stem) {
        return ParsedName {
            tag: VersionTag {
                base: base.to_string(),
                version,
                extension: extension.to_string(),
            },
            encoding: VersionEncoding::Explicit,
        };
    }

    ParsedName {
        tag: VersionTag {
            base: stem.to_string(),
            version: 1,
            extension: extension.to_string(),
        },
        encoding: VersionEncoding::Implicit,
    }
}

/// Build a filename: `base+ext` at version 1, `base.v<N>ext` above.
///
/// `ext` may be given with or without its leading dot. A version of 0 is
/// treated as 1.
pub fn format(base: &str, version: u32, ext: &str) -> String {
    let ext = dotted(ext);
    if version > 1 {
        format!("{base}{VERSION_MARKER}{version}{ext}")
    } else {
        format!("{base}{ext}")
    }
}

/// Build a filename that always carries the `.v<N>` suffix, including `.v1`.
pub fn format_explicit(base: &str, version: u32, ext: &str) -> String {
    let ext = dotted(ext);
    let version = version.max(1);
    format!("{base}{VERSION_MARKER}{version}{ext}")
}

/// Split a filename into stem and extension (with dot).
///
/// Mirrors `Path::file_stem`/`Path::extension`: a leading dot does not start
/// an extension, so `.hidden` has no extension.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, ""),
        Some(idx) => (&file_name[..idx], &file_name[idx..]),
    }
}

fn split_version_suffix(stem: &str) -> Option<(&str, u32)> {
    let idx = stem.rfind(VERSION_MARKER)?;
    let digits = &stem[idx + VERSION_MARKER.len()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let version: u32 = digits.parse().ok()?;
    if version == 0 {
        return None;
    }
    Some((&stem[..idx], version))
}

fn dotted(ext: &str) -> String {
    if ext.is_empty() || ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}
