use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const ARCHIVE_EXTENSION: &str = "arsc";
pub const NATIVE_MODEL_EXTENSION: &str = "aoa";
pub const EXCHANGE_MODEL_EXTENSION: &str = "fbx";
pub const LOG_FILE_NAME: &str = "log.txt";
pub const STATS_FILE_NAME: &str = "stats2.json";
pub const DEFAULT_EXCLUDED_DIR_NAME: &str = "airports-db";
pub const DEFAULT_CONVERTER: &str = "osgconvd";
pub const DEFAULT_TEXTURE_FORMAT: &str = "dds";
pub const DEFAULT_NOTIFY_LEVEL: &str = "DEBUG";
pub const NOTIFY_LEVEL_ENV: &str = "OSG_NOTIFY_LEVEL";
pub const CONVERT_TEXTURES_FLAG: &str = "--convert-textures";

static KEYWORD_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(\w+)").expect("valid keyword line regex"));

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub archives_scanned: u64,
    pub entries_scanned: u64,
    pub converted: u64,
    pub failed: u64,
    pub archives_written: u64,
}

impl BatchStats {
    pub fn attempted(&self) -> u64 {
        self.converted + self.failed
    }
}

/// Maps paths under one root to the same relative location under another.
///
/// Every directory segment between the root and the file is preserved, so
/// `inverse(forward(p)) == p` for any `p` below the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
    source_root: PathBuf,
    destination_root: PathBuf,
}

impl PathMapping {
    pub fn new(source_root: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: destination_root.into(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn forward(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.source_root).ok()?;
        Some(self.destination_root.join(relative))
    }

    pub fn inverse(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.destination_root).ok()?;
        Some(self.source_root.join(relative))
    }

    // archive path without its extension, re-rooted
    pub fn archive_dir(&self, archive_path: &Path) -> Option<PathBuf> {
        self.forward(&archive_path.with_extension(""))
    }
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
}

pub fn parse_keyword(line: &str) -> Option<&str> {
    KEYWORD_LINE_RE
        .captures(line.trim())
        .and_then(|captures| captures.get(1))
        .map(|keyword| keyword.as_str())
}

pub fn entry_location(archive_path: &Path, entry_name: &str) -> String {
    archive_path.join(entry_name).to_string_lossy().into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, keyword: &str, location: &str) {
        self.entries
            .entry(keyword.to_string())
            .or_default()
            .insert(location.to_string());
    }

    pub fn locations(&self, keyword: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(keyword)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ascending by count, then keyword
    pub fn counts(&self) -> Vec<KeywordCount> {
        let mut counts: Vec<KeywordCount> = self
            .entries
            .iter()
            .map(|(keyword, locations)| KeywordCount {
                keyword: keyword.clone(),
                count: locations.len(),
            })
            .collect();
        counts.sort_by(compare_counts);
        counts
    }
}

fn compare_counts(left: &KeywordCount, right: &KeywordCount) -> Ordering {
    left.count
        .cmp(&right.count)
        .then_with(|| left.keyword.cmp(&right.keyword))
}
