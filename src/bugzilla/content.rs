//! Attachment payload handling: compression sniffing, mimetype correction,
//! file name sanitizing and size formatting.

use crate::error::{Error, Result};
use std::io::Read;

/// Compressed payloads nested deeper than this are rejected.
const MAX_COMPRESSION_LAYERS: usize = 16;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
}

impl Compression {
    /// Identify a supported compression format from magic numbers.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match infer::get(data)?.mime_type() {
            "application/gzip" => Some(Compression::Gzip),
            "application/x-bzip2" => Some(Compression::Bzip2),
            "application/x-xz" => Some(Compression::Xz),
            _ => None,
        }
    }

    fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let read = match self {
            Compression::Gzip => flate2::read::MultiGzDecoder::new(data).read_to_end(&mut out),
            Compression::Bzip2 => bzip2::read::BzDecoder::new(data).read_to_end(&mut out),
            Compression::Xz => xz2::read::XzDecoder::new(data).read_to_end(&mut out),
        };
        read.map_err(|e| Error::protocol(format!("failed decompressing {:?} data: {}", self, e)))?;
        Ok(out)
    }
}

/// Transparently undo gzip/bzip2/xz compression, repeating while the
/// result still sniffs as a compressed format.
pub fn decompress_if_needed(data: &[u8]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for _ in 0..MAX_COMPRESSION_LAYERS {
        match Compression::sniff(&current) {
            Some(format) => current = format.decompress(&current)?,
            None => return Ok(current),
        }
    }
    Err(Error::protocol(format!(
        "attachment nested more than {} compression layers deep",
        MAX_COMPRESSION_LAYERS
    )))
}

/// Best guess at the mimetype of a payload from its content.
pub fn sniff_mimetype(data: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type();
    }
    if std::str::from_utf8(data).is_ok() {
        "text/plain"
    } else {
        OCTET_STREAM
    }
}

/// Mimetype to report for a payload, ignoring what the uploader claimed.
/// Content that can't be identified is assumed to be plain text.
pub fn corrected_mimetype(data: &[u8]) -> &'static str {
    match sniff_mimetype(data) {
        OCTET_STREAM => "text/plain",
        mime => mime,
    }
}

/// Reduce a server-supplied file name to a bare name that cannot escape
/// the directory it is saved into.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    base.replace("..", "")
}

/// Binary-unit size used in attachment listings.
pub fn format_size(size: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let size = size as f64;
    if size < MIB {
        format!("{:.2}K", size / KIB)
    } else {
        format!("{:.2}M", size / MIB)
    }
}
