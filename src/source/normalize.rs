use crate::LocatorError;
use url::Url;

/// Normalizes a listing locator into its canonical form
///
/// Two spellings of the same listing URL must normalize identically, since
/// in-batch deduplication and identity derivation both key on the result.
///
/// # Normalization Steps
///
/// 1. Parse the locator; reject if malformed
/// 2. Validate scheme (http or https; http is kept as-is so local mock
///    servers remain reachable)
/// 3. Lowercase the host
/// 4. Remove www. prefix from the host
/// 5. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 6. Remove fragment
/// 7. Drop the query string entirely; listing identity on both portals
///    lives in the path, and every observed parameter (channel, search
///    context, tracking) varies between visits to the same listing
pub fn normalize_locator(locator: &str) -> Result<Url, LocatorError> {
    let mut url = Url::parse(locator).map_err(|e| LocatorError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(LocatorError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let mut normalized_host = host.to_lowercase();

        if normalized_host.starts_with("www.") {
            normalized_host = normalized_host[4..].to_string();
        }

        url.set_host(Some(&normalized_host))
            .map_err(|e| LocatorError::Parse(format!("Failed to set host: {}", e)))?;
    } else {
        return Err(LocatorError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);
    url.set_query(None);

    Ok(url)
}

/// Normalizes a path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            // Empty segments come from repeated slashes
            "" | "." => continue,
            ".." => {
                if !normalized_segments.is_empty() {
                    normalized_segments.pop();
                }
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}
