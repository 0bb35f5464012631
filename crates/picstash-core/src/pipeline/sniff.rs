//! Image format sniffing from file content.
//!
//! Only the bytes decide. File names, declared MIME types and URL suffixes
//! never reach this module. The table of formats is closed: anything not
//! listed in [`DetectedFormat`] is rejected.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes read from the start of a file for sniffing.
pub const SNIFF_LEN: usize = 4096;

/// WBMP dimensions above this are treated as noise rather than an image.
const WBMP_MAX_DIMENSION: u32 = 2048;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JP2_SIGNATURE: &[u8] = &[
    0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];
const JBIG2_SIGNATURE: &[u8] = &[0x97, b'J', b'B', b'2', 0x0D, 0x0A, 0x1A, 0x0A];

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectedFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Wbmp,
    Ico,
    Psd,
    TiffIntel,
    TiffMotorola,
    Swf,
    Swc,
    Iff,
    Jpc,
    Jp2,
    Jpx,
    Jb2,
    Xbm,
}

impl DetectedFormat {
    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            // A JPEG 2000 codestream is filed alongside JPEG
            DetectedFormat::Jpeg | DetectedFormat::Jpc => "jpg",
            DetectedFormat::Png => "png",
            DetectedFormat::Gif => "gif",
            DetectedFormat::Bmp | DetectedFormat::Wbmp => "bmp",
            DetectedFormat::Ico => "ico",
            DetectedFormat::Psd => "psd",
            DetectedFormat::TiffIntel | DetectedFormat::TiffMotorola => "tiff",
            DetectedFormat::Swf => "swf",
            DetectedFormat::Swc => "swc",
            DetectedFormat::Iff => "iff",
            DetectedFormat::Jp2 => "jp2",
            DetectedFormat::Jpx => "jpx",
            DetectedFormat::Jb2 => "jb2",
            DetectedFormat::Xbm => "xbm",
        }
    }
}

/// Sniff the format of a file on disk.
///
/// Returns `None` when the file cannot be read or matches no supported
/// signature.
pub fn sniff(path: &Path) -> Option<DetectedFormat> {
    let mut file = File::open(path).ok()?;
    let total_len = file.metadata().ok()?.len();

    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .ok()?;

    sniff_bytes(&header, total_len)
}

/// Sniff the format from the leading bytes of some content.
///
/// `total_len` is the full content length; only WBMP needs it, to check the
/// body is large enough for the declared dimensions.
pub fn sniff_bytes(header: &[u8], total_len: u64) -> Option<DetectedFormat> {
    if header.len() < 3 {
        return None;
    }

    // JPEG: FF D8 FF
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(DetectedFormat::Jpeg);
    }

    if header.starts_with(PNG_SIGNATURE) {
        return Some(DetectedFormat::Png);
    }

    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        return Some(DetectedFormat::Gif);
    }

    // Flash: uncompressed (FWS) and zlib-compressed (CWS)
    if header.starts_with(b"FWS") {
        return Some(DetectedFormat::Swf);
    }
    if header.starts_with(b"CWS") {
        return Some(DetectedFormat::Swc);
    }

    if header.starts_with(b"8BPS") {
        return Some(DetectedFormat::Psd);
    }

    // BMP: "BM" followed by the rest of a 14-byte file header
    if header.starts_with(b"BM") && header.len() >= 14 {
        return Some(DetectedFormat::Bmp);
    }

    // TIFF: byte-order mark followed by version 42 in that byte order
    if header.starts_with(&[b'I', b'I', 0x2A, 0x00]) {
        return Some(DetectedFormat::TiffIntel);
    }
    if header.starts_with(&[b'M', b'M', 0x00, 0x2A]) {
        return Some(DetectedFormat::TiffMotorola);
    }

    // JPEG 2000 codestream: SOC marker then SIZ marker
    if header.starts_with(&[0xFF, 0x4F, 0xFF, 0x51]) {
        return Some(DetectedFormat::Jpc);
    }

    if header.starts_with(JP2_SIGNATURE) {
        return Some(jp2_family(header));
    }

    if header.starts_with(JBIG2_SIGNATURE) {
        return Some(DetectedFormat::Jb2);
    }

    if is_iff(header) {
        return Some(DetectedFormat::Iff);
    }

    // ICO: reserved 0, type 1, at least one image
    if header.len() >= 6
        && header.starts_with(&[0x00, 0x00, 0x01, 0x00])
        && u16::from_le_bytes([header[4], header[5]]) > 0
    {
        return Some(DetectedFormat::Ico);
    }

    if is_xbm(header) {
        return Some(DetectedFormat::Xbm);
    }

    // WBMP has no magic number, so it goes last
    if is_wbmp(header, total_len) {
        return Some(DetectedFormat::Wbmp);
    }

    None
}

/// Distinguish JP2 from JPX by the brand in the `ftyp` box after the
/// signature box.
fn jp2_family(header: &[u8]) -> DetectedFormat {
    let ftyp = &header[JP2_SIGNATURE.len()..];
    if ftyp.len() >= 12 && &ftyp[4..8] == b"ftyp" && &ftyp[8..12] == b"jpx " {
        DetectedFormat::Jpx
    } else {
        DetectedFormat::Jp2
    }
}

/// IFF: "FORM", a big-endian length, then an image form type.
fn is_iff(header: &[u8]) -> bool {
    header.len() >= 12
        && header.starts_with(b"FORM")
        && matches!(&header[8..12], b"ILBM" | b"PBM ")
}

/// XBM is C source text: `#define <name>_width N` and `#define <name>_height N`.
fn is_xbm(header: &[u8]) -> bool {
    if !header.starts_with(b"#define") {
        return false;
    }
    let text = String::from_utf8_lossy(header);

    let mut has_width = false;
    let mut has_height = false;
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("#define") {
            continue;
        }
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        if value.parse::<u32>().is_err() {
            continue;
        }
        if name.ends_with("_width") {
            has_width = true;
        } else if name.ends_with("_height") {
            has_height = true;
        }
        if has_width && has_height {
            return true;
        }
    }
    false
}

/// WBMP type 0: type byte 0, fixed header (with optional extension bytes),
/// then multi-byte width and height.
fn is_wbmp(header: &[u8], total_len: u64) -> bool {
    let mut bytes = header.iter().copied();

    if bytes.next() != Some(0) {
        return false;
    }
    // Fixed header; extension headers continue while the high bit is set
    loop {
        match bytes.next() {
            Some(b) if b & 0x80 != 0 => continue,
            Some(_) => break,
            None => return false,
        }
    }

    let Some(width) = read_wbmp_int(&mut bytes) else {
        return false;
    };
    let Some(height) = read_wbmp_int(&mut bytes) else {
        return false;
    };
    if width == 0 || height == 0 {
        return false;
    }

    // One bit per pixel, rows padded to whole bytes
    let header_len = (header.len() - bytes.len()) as u64;
    let body_len = u64::from(width.div_ceil(8)) * u64::from(height);
    total_len >= header_len + body_len
}

fn read_wbmp_int(bytes: &mut impl Iterator<Item = u8>) -> Option<u32> {
    let mut value: u32 = 0;
    loop {
        let b = bytes.next()?;
        value = (value << 7) | u32::from(b & 0x7F);
        if value > WBMP_MAX_DIMENSION {
            return None;
        }
        if b & 0x80 == 0 {
            return Some(value);
        }
    }
}
