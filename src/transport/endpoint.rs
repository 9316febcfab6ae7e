//! Socket endpoint resolution.
//!
//! Turns the URL of the page hosting the client into the socket URL of the
//! peer, and encodes request args for the handshake.
//!
//! | Page | Socket |
//! |------|--------|
//! | `http://host/app/index.html` | `ws://host/app/ws` |
//! | `https://host:8443/app/` | `wss://host:8443/app/ws` |

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Path segment the peer serves the socket under.
const SOCKET_SEGMENT: &str = "/ws";

// ============================================================================
// Functions
// ============================================================================

/// Derives the socket URL from a page URL.
///
/// The scheme maps `http`→`ws` and `https`→`wss`. Host and port are kept.
/// Everything after the last `/` of the path is dropped and `/ws` appended.
/// Query and fragment are discarded.
///
/// # Errors
///
/// - [`Error::Url`] if `page_url` does not parse
/// - [`Error::Config`] if the scheme is not http(s) or there is no host
pub fn derive_ws_url(page_url: &str) -> Result<String> {
    let page = Url::parse(page_url)?;

    let scheme = match page.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::config(format!(
                "Cannot derive socket URL from '{other}' page"
            )));
        }
    };

    let host = page
        .host_str()
        .ok_or_else(|| Error::config(format!("Page URL has no host: {page_url}")))?;

    let path = page.path();
    let base = path.rfind('/').map_or("", |idx| &path[..idx]);

    let mut socket = format!("{scheme}://{host}");
    if let Some(port) = page.port() {
        socket.push_str(&format!(":{port}"));
    }
    socket.push_str(base);
    socket.push_str(SOCKET_SEGMENT);

    Ok(socket)
}

/// Encodes request args as a `?key=value&...` query string.
///
/// Returns `None` when there are no args.
#[must_use]
pub fn encode_request_args(args: &[(String, String)]) -> Option<String> {
    if args.is_empty() {
        return None;
    }

    let pairs: Vec<String> = args
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect();

    Some(format!("?{}", pairs.join("&")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_page() {
        assert_eq!(
            derive_ws_url("http://localhost:5000/parameters/index.html").unwrap(),
            "ws://localhost:5000/parameters/ws"
        );
    }

    #[test]
    fn test_https_page_default_port() {
        assert_eq!(
            derive_ws_url("https://example.com/app/").unwrap(),
            "wss://example.com/app/ws"
        );
    }

    #[test]
    fn test_root_page_drops_query() {
        assert_eq!(
            derive_ws_url("http://example.com/index.html?x=1#top").unwrap(),
            "ws://example.com/ws"
        );
    }

    #[test]
    fn test_ipv6_host() {
        assert_eq!(
            derive_ws_url("http://[::1]:8080/a/b").unwrap(),
            "ws://[::1]:8080/a/ws"
        );
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = derive_ws_url("file:///tmp/index.html").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_unparsable_page() {
        assert!(matches!(derive_ws_url("::"), Err(Error::Url(_))));
    }

    #[test]
    fn test_encode_request_args() {
        assert_eq!(encode_request_args(&[]), None);

        let args = vec![
            ("data".to_string(), "requestargtest".to_string()),
            ("q".to_string(), "a b&c".to_string()),
        ];
        assert_eq!(
            encode_request_args(&args).unwrap(),
            "?data=requestargtest&q=a%20b%26c"
        );
    }
}
