//! Mapping of URLs to archive entry paths
//!
//! Every downloaded payload is stored in the archive under a path that mirrors
//! its URL: the host is the top-level directory, followed by the URL path
//! segments. Directory-like URLs get an `index.html` leaf, like a static
//! site mirror would.
//!
//! ```
//! use batch_zip::entry_path::derive_entry_path;
//!
//! assert_eq!(
//!     derive_entry_path("https://example.com/").unwrap(),
//!     "example.com/index.html"
//! );
//! assert_eq!(
//!     derive_entry_path("https://example.com/assets/img.png?v=2").unwrap(),
//!     "example.com/assets/img.png"
//! );
//! ```

use crate::error::{Error, Result};
use std::path::Path;
use url::Url;

/// Characters that are not portable in archive entry names
const UNSAFE_CHARS: &[char] = &['/', '?', '<', '>', '\\', ':', '*', '|', '"'];

/// Leaf appended to directory-like URLs
pub const INDEX_FILE: &str = "index.html";

/// Derive the archive entry path for a URL
///
/// The result is relative, `/`-separated, never contains a `..` segment and
/// is the same for the same URL on every call. Query string and fragment do
/// not take part.
pub fn derive_entry_path(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
    entry_path_for(&parsed)
}

/// [`derive_entry_path`] for an already parsed URL
pub fn entry_path_for(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidUrl(format!("{url}: URL has no host")))?;

    let raw_path = url.path();
    let mut segments: Vec<String> = raw_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize_segment)
        .collect();

    let directory_like = raw_path.is_empty() || raw_path.ends_with('/');
    let has_extension = segments
        .last()
        .is_some_and(|last| Path::new(last).extension().is_some());

    if directory_like || !has_extension {
        segments.push(INDEX_FILE.to_string());
    }

    let mut entry = sanitize_segment(host);
    for segment in segments {
        entry.push('/');
        entry.push_str(&segment);
    }
    Ok(entry)
}

/// Replace unsafe characters with `_`; `.` and `..` become `_` as well
fn sanitize_segment(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return "_".to_string();
    }
    segment
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}
