//! MIME detection: magic bytes first, then the file extension.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const SNIFF_LENGTH: u64 = 8 * 1024; // 8KB

pub const FALLBACK_MIME: &str = "application/octet-stream";

pub fn detect_mime_type(path: &Path) -> io::Result<String> {
    let mut header = Vec::with_capacity(SNIFF_LENGTH as usize);
    File::open(path)?.take(SNIFF_LENGTH).read_to_end(&mut header)?;

    Ok(from_header(&header)
        .or_else(|| from_extension(path))
        .unwrap_or_else(|| FALLBACK_MIME.to_string()))
}

pub fn from_header(header: &[u8]) -> Option<String> {
    infer::get(header).map(|kind| kind.mime_type().to_string())
}

pub fn from_extension(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first_raw().map(str::to_string)
}
