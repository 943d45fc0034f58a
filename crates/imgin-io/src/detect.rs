//! Format detection utilities.
//!
//! Magic-byte predicates used by the bundled plugins' `valid_file` checks,
//! plus path helpers shared with the registry.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of header bytes read for sniffing.
pub const SNIFF_LEN: usize = 8;

/// Reads up to `n` leading bytes of the file at `path`.
///
/// Returns an empty vector when the file cannot be opened, so callers can
/// treat unreadable files as "no match".
pub fn read_header(path: &Path, n: usize) -> Vec<u8> {
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let mut header = Vec::with_capacity(n);
    match file.take(n as u64).read_to_end(&mut header) {
        Ok(_) => header,
        Err(_) => Vec::new(),
    }
}

/// Lowercased extension of `path`, ignoring a `?key=value` option suffix.
pub fn extension_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let name = name.split_once('?').map_or(name, |(base, _)| base);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

/// Binary PGM/PPM (`P5`, `P6`) or PFM (`Pf`, `PF`) magic.
pub fn is_pnm(bytes: &[u8]) -> bool {
    bytes.len() >= 3
        && bytes[0] == b'P'
        && matches!(bytes[1], b'5' | b'6' | b'f' | b'F')
        && bytes[2].is_ascii_whitespace()
}

/// Radiance `#?` magic.
pub fn is_hdr(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0..2] == [b'#', b'?']
}

/// TIFF magic, little-endian (`II*\0`) or big-endian (`MM\0*`).
pub fn is_tiff(bytes: &[u8]) -> bool {
    bytes.len() >= 4
        && (bytes[0..4] == [0x49, 0x49, 0x2A, 0x00] || bytes[0..4] == [0x4D, 0x4D, 0x00, 0x2A])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a/b/photo.TIF")).as_deref(), Some("tif"));
        assert_eq!(extension_of(Path::new("x.null?RES=4x4")).as_deref(), Some("null"));
        assert_eq!(extension_of(Path::new("noext")), None);
        assert_eq!(extension_of(Path::new("trailing.")), None);
        assert_eq!(extension_of(&PathBuf::new()), None);
    }

    #[test]
    fn test_magic() {
        assert!(is_pnm(b"P6\n64 32\n255\n"));
        assert!(is_pnm(b"Pf 4 4"));
        assert!(!is_pnm(b"P3\n"));
        assert!(!is_pnm(b"P6"));
        assert!(is_hdr(b"#?RADIANCE\n"));
        assert!(!is_hdr(b"#!"));
        assert!(is_tiff(&[0x49, 0x49, 0x2A, 0x00, 8, 0, 0, 0]));
        assert!(is_tiff(&[0x4D, 0x4D, 0x00, 0x2A]));
        assert!(!is_tiff(&[0x49, 0x49]));
    }

    #[test]
    fn test_read_header_missing_file() {
        assert!(read_header(Path::new("/nonexistent/imgin/file.ppm"), SNIFF_LEN).is_empty());
    }
}
