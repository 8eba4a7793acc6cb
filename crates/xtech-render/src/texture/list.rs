//! `graphics.list` load lists.
//!
//! A list describes every lazily loadable image of one directory so a level
//! can register its textures without touching the filesystem per image.
//! Records are four lines followed by a blank line:
//!
//! ```text
//! block-1
//! block-1.png
//!   32
//!   32
//!
//! ```
//!
//! Width and height are the original (full-scale) size.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use super::sidecar::atoi;

pub const LIST_FILE_NAME: &str = "graphics.list";

/// Image paths this many bytes or longer are rejected.
pub const MAX_LIST_PATH: usize = 255;

/// Largest dimension a list entry may declare.
pub const MAX_LIST_DIMENSION: i32 = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    /// Image path relative to the list's directory.
    pub path: String,
    pub w: i32,
    pub h: i32,
}

impl ListEntry {
    /// Checks the limits a loader enforces before trusting an entry.
    pub fn validate(&self) -> Result<(), String> {
        if self.path.is_empty() || self.path.len() >= MAX_LIST_PATH {
            return Err(format!("path length {} out of range", self.path.len()));
        }
        let range = 0..=MAX_LIST_DIMENSION;
        if !range.contains(&self.w) || !range.contains(&self.h) {
            return Err(format!("dimensions {}x{} out of range", self.w, self.h));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadList {
    pub entries: Vec<ListEntry>,
}

impl LoadList {
    /// Parses list text. Incomplete trailing records and records with
    /// unparsable dimensions are skipped with a warning.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));

        loop {
            let Some(name) = lines.by_ref().find(|l| !l.trim().is_empty()) else { break };
            let (Some(path), Some(w), Some(h)) = (lines.next(), lines.next(), lines.next()) else {
                log::warn!("graphics.list: truncated record '{name}'");
                break;
            };

            match (atoi(w.as_bytes()), atoi(h.as_bytes())) {
                (Some(w), Some(h)) => entries.push(ListEntry {
                    name: name.to_string(),
                    path: path.to_string(),
                    w,
                    h,
                }),
                _ => log::warn!("graphics.list: bad dimensions for '{name}'"),
            }
        }

        Self { entries }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn get(&self, name: &str) -> Option<&ListEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn push(&mut self, entry: ListEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Serializes in the on-disk record format.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let _ = write!(out, "{}\n{}\n{:>4}\n{:>4}\n\n", e.name, e.path, e.w, e.h);
        }
        out
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "block-1\nblock-1.png\n  32\n  32\n\nbackground2-3\nbackground2-3.png\n 512\n3000\n\n";

    #[test]
    fn parses_records() {
        let list = LoadList::parse(SAMPLE);
        assert_eq!(list.len(), 2);
        let bg = list.get("background2-3").unwrap();
        assert_eq!((bg.path.as_str(), bg.w, bg.h), ("background2-3.png", 512, 3000));
    }

    #[test]
    fn text_form_matches_record_layout() {
        let list = LoadList::parse(SAMPLE);
        assert_eq!(list.to_text(), SAMPLE);
    }

    #[test]
    fn truncated_tail_is_dropped() {
        let list = LoadList::parse("a\na.png\n  1\n  1\n\nb\nb.png\n");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let list = LoadList::parse("a\r\na.png\r\n  4\r\n  8\r\n\r\n");
        assert_eq!(list.get("a").map(|e| (e.w, e.h)), Some((4, 8)));
    }

    #[test]
    fn validate_limits() {
        let ok = ListEntry { name: "a".into(), path: "a.png".into(), w: 8192, h: 0 };
        assert!(ok.validate().is_ok());
        assert!(ListEntry { w: 8193, ..ok.clone() }.validate().is_err());
        assert!(ListEntry { path: "x".repeat(256), ..ok }.validate().is_err());
    }

    #[test]
    fn path_of_exactly_the_limit_is_rejected() {
        let entry = |len| ListEntry { name: "a".into(), path: "x".repeat(len), w: 1, h: 1 };
        assert!(entry(MAX_LIST_PATH - 1).validate().is_ok());
        assert!(entry(MAX_LIST_PATH).validate().is_err());
    }
}
