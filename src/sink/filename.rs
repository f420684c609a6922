//! Output filename derivation.
//!
//! A pattern may contain one `#`, which is replaced by
//! `<stream name>-<sequence>` with the sequence zero-padded to six digits.
//! A pattern without `#` names a single file that every frame is appended
//! to.

use std::path::{Path, PathBuf};

/// Template used when the pattern is empty or names a directory.
pub const DEFAULT_TEMPLATE: &str = "frame-#.bin";

/// Marker replaced by the stream name and sequence number.
pub const SUBSTITUTION_MARKER: char = '#';

/// How the output file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Successive frames accumulate in the same file.
    Append,
    /// Each frame gets a fresh file.
    Truncate,
}

/// A filename derived for one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilename {
    path: PathBuf,
    substituted: bool,
}

impl ResolvedFilename {
    /// Path the buffer is written to.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append for a fixed name, truncate for a per-frame name.
    pub fn open_mode(&self) -> OpenMode {
        if self.substituted {
            OpenMode::Truncate
        } else {
            OpenMode::Append
        }
    }

    /// Whether the name ends with `suffix` (case-sensitive).
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.path
            .to_str()
            .map(|s| s.ends_with(suffix))
            .unwrap_or(false)
    }
}

/// Filename template supplied at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenamePattern {
    template: String,
}

impl FilenamePattern {
    /// Creates a pattern, applying the default template to empty or
    /// directory-only input.
    pub fn new(pattern: impl Into<String>) -> Self {
        let mut template = pattern.into();
        if template.is_empty() || template.ends_with('/') {
            template.push_str(DEFAULT_TEMPLATE);
        }
        Self { template }
    }

    /// The effective template after defaulting.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Whether frames will be appended to a single file.
    pub fn is_append(&self) -> bool {
        !self.template.contains(SUBSTITUTION_MARKER)
    }

    /// Derives the filename for frame `sequence` of the named stream.
    pub fn resolve(&self, stream_name: &str, sequence: u32) -> ResolvedFilename {
        match self.template.find(SUBSTITUTION_MARKER) {
            Some(pos) => {
                let mut name = String::with_capacity(self.template.len() + stream_name.len() + 8);
                name.push_str(&self.template[..pos]);
                name.push_str(&format!("{stream_name}-{sequence:06}"));
                name.push_str(&self.template[pos + SUBSTITUTION_MARKER.len_utf8()..]);
                ResolvedFilename {
                    path: PathBuf::from(name),
                    substituted: true,
                }
            }
            None => ResolvedFilename {
                path: PathBuf::from(&self.template),
                substituted: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_marker_is_replaced() {
        let pattern = FilenamePattern::new("img-#.raw");
        let resolved = pattern.resolve("cam0", 7);

        assert_eq!(resolved.path(), Path::new("img-cam0-000007.raw"));
        assert_eq!(resolved.open_mode(), OpenMode::Truncate);
    }

    #[test]
    fn test_only_first_marker_is_replaced() {
        let pattern = FilenamePattern::new("#/frame-#.bin");
        let resolved = pattern.resolve("s", 1);

        assert_eq!(resolved.path(), Path::new("s-000001/frame-#.bin"));
    }

    #[test]
    fn test_no_marker_appends_verbatim() {
        let pattern = FilenamePattern::new("out.bin");
        let resolved = pattern.resolve("cam0", 42);

        assert!(pattern.is_append());
        assert_eq!(resolved.path(), Path::new("out.bin"));
        assert_eq!(resolved.open_mode(), OpenMode::Append);
    }

    #[test]
    fn test_empty_pattern_uses_default() {
        let resolved = FilenamePattern::new("").resolve("cam0", 3);
        assert_eq!(resolved.path(), Path::new("frame-cam0-000003.bin"));
    }

    #[test]
    fn test_directory_pattern_uses_default() {
        let resolved = FilenamePattern::new("captures/").resolve("cam0", 3);
        assert_eq!(resolved.path(), Path::new("captures/frame-cam0-000003.bin"));
        assert_eq!(resolved.open_mode(), OpenMode::Truncate);
    }

    #[test]
    fn test_large_sequence_is_not_truncated() {
        let resolved = FilenamePattern::new("#").resolve("a", 12_345_678);
        assert_eq!(resolved.path(), Path::new("a-12345678"));
    }

    #[test]
    fn test_suffix_detection() {
        let pattern = FilenamePattern::new("shot-#.dng");
        assert!(pattern.resolve("cam0", 1).has_suffix(".dng"));
        assert!(!pattern.resolve("cam0", 1).has_suffix(".DNG"));
        assert!(!FilenamePattern::new("").resolve("cam0", 1).has_suffix(".dng"));
    }

    proptest! {
        #[test]
        fn prop_substitution_matches_template(
            prefix in "[a-z/_.]{0,12}",
            suffix in "[a-z_.]{0,12}",
            name in "[a-z0-9]{1,8}",
            sequence in any::<u32>(),
        ) {
            let pattern = FilenamePattern::new(format!("{prefix}#{suffix}"));
            let resolved = pattern.resolve(&name, sequence);
            let expected = format!("{prefix}{name}-{sequence:06}{suffix}");

            prop_assert_eq!(resolved.path(), Path::new(&expected));
            prop_assert_eq!(resolved.open_mode(), OpenMode::Truncate);
        }

        #[test]
        fn prop_patterns_without_marker_are_fixed(
            base in "[a-z_.]{1,16}",
            seq_a in any::<u32>(),
            seq_b in any::<u32>(),
        ) {
            let pattern = FilenamePattern::new(base.clone());
            let a = pattern.resolve("x", seq_a);
            let b = pattern.resolve("y", seq_b);

            prop_assert_eq!(a.path(), Path::new(&base));
            prop_assert_eq!(a, b);
        }
    }
}
