//! `<image>.size` sidecar files.
//!
//! Ten bytes: width and height as four right-aligned characters, each followed
//! by a newline (`" 800\n 600\n"`). The converter writes the original
//! (full-scale) size so lazy textures know their dimensions without decoding.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Exact sidecar length in bytes.
pub const SIDECAR_LEN: usize = 10;

/// Path of the sidecar belonging to `image`.
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut s = image.as_os_str().to_owned();
    s.push(".size");
    PathBuf::from(s)
}

/// Parses a C `atoi`-style integer: leading blanks, optional sign, digits.
/// Returns `None` when no digit is present.
pub(crate) fn atoi(field: &[u8]) -> Option<i32> {
    let mut it = field.iter().copied().skip_while(|b| *b == b' ' || *b == b'\t').peekable();
    let neg = match it.peek() {
        Some(b'-') => {
            it.next();
            true
        }
        Some(b'+') => {
            it.next();
            false
        }
        _ => false,
    };

    let mut seen = false;
    let mut v: i32 = 0;
    for b in it.take_while(u8::is_ascii_digit) {
        seen = true;
        v = v.saturating_mul(10).saturating_add((b - b'0') as i32);
    }
    seen.then_some(if neg { -v } else { v })
}

/// Parses sidecar contents into `(w, h)`.
///
/// Anything that is not exactly two positive four-character fields is rejected.
pub fn parse(bytes: &[u8]) -> Option<(i32, i32)> {
    if bytes.len() != SIDECAR_LEN || bytes[4] != b'\n' || bytes[9] != b'\n' {
        return None;
    }
    let w = atoi(&bytes[0..4])?;
    let h = atoi(&bytes[5..9])?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Reads the sidecar next to `image`; `None` when absent or malformed.
pub fn read(image: &Path) -> Option<(i32, i32)> {
    let bytes = fs::read(sidecar_path(image)).ok()?;
    parse(&bytes)
}

/// Formats `(w, h)` as sidecar contents.
pub fn format(w: u32, h: u32) -> io::Result<String> {
    if w > 9999 || h > 9999 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{w}x{h} does not fit a size sidecar"),
        ));
    }
    Ok(format!("{w:>4}\n{h:>4}\n"))
}

/// Writes the sidecar next to `image`.
pub fn write(image: &Path, w: u32, h: u32) -> io::Result<()> {
    fs::write(sidecar_path(image), format(w, h)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_padded_fields() {
        assert_eq!(parse(b" 800\n 600\n"), Some((800, 600)));
        assert_eq!(parse(b"4096\n  32\n"), Some((4096, 32)));
    }

    #[test]
    fn rejects_malformed_contents() {
        assert_eq!(parse(b" 800\n 600"), None);
        assert_eq!(parse(b" 800 600\n\n"), None);
        assert_eq!(parse(b"abcd\n 600\n"), None);
        assert_eq!(parse(b"   0\n 600\n"), None);
        assert_eq!(parse(b" 800\n 600\n\n"), None);
    }

    #[test]
    fn atoi_stops_at_first_non_digit() {
        assert_eq!(atoi(b"  12x4"), Some(12));
        assert_eq!(atoi(b" -7"), Some(-7));
        assert_eq!(atoi(b"   "), None);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("block-1.png");
        write(&img, 64, 1500).unwrap();
        assert_eq!(fs::read(sidecar_path(&img)).unwrap().len(), SIDECAR_LEN);
        assert_eq!(read(&img), Some((64, 1500)));
    }

    #[test]
    fn oversized_dimensions_are_refused() {
        assert!(format(10_000, 1).is_err());
    }
}
