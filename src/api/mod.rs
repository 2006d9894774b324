//! Admin API: request helper, error taxonomy and typed endpoints

pub mod client;
pub mod conversations;
pub mod error;
pub mod otp;
pub mod stats;
pub mod tickets;

pub use client::{AdminClient, RequestOptions};
pub use error::ApiError;

use url::Url;

/// Origin used only to let `url` percent-encode path segments.
const SEGMENT_ORIGIN: &str = "http://localhost/";

/// Absolute path built from `segments`, each encoded as a single path segment.
pub(crate) fn segment_path<I>(segments: I) -> Result<String, ApiError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut url = Url::parse(SEGMENT_ORIGIN)
        .map_err(|e| ApiError::validation(format!("Invalid path origin: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::validation("Path cannot hold segments"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_path_encodes_each_segment() {
        assert_eq!(
            segment_path(["api", "admin", "abc-123"]).unwrap(),
            "/api/admin/abc-123"
        );
        assert_eq!(segment_path(["c", "a/b c"]).unwrap(), "/c/a%2Fb%20c");
        assert_eq!(segment_path(["c", "é?#%"]).unwrap(), "/c/%C3%A9%3F%23%25");
    }
}
