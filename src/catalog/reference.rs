use crate::catalog::error::CatalogError;

const ID_LEN: usize = 22;

/// Extracts the playlist id from a share link, a `spotify:playlist:` uri or a bare id.
pub fn parse_playlist_reference(reference: &str) -> Result<String, CatalogError> {
    let trimmed = reference.trim();
    let invalid = || CatalogError::InvalidReference(reference.to_string());

    if trimmed.is_empty() {
        return Err(invalid());
    }

    let candidate = if let Some(rest) = trimmed.strip_prefix("spotify:playlist:") {
        rest
    } else if let Some(path) = strip_host(trimmed) {
        // /playlist/<id> or /intl-xx/playlist/<id>, query and fragment dropped
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut segment = segments.next();
        if segment.is_some_and(|s| s.starts_with("intl-")) {
            segment = segments.next();
        }
        match (segment, segments.next()) {
            (Some("playlist"), Some(id)) => id,
            _ => return Err(invalid()),
        }
    } else {
        trimmed
    };

    if is_playlist_id(candidate) {
        Ok(candidate.to_string())
    } else {
        Err(invalid())
    }
}

fn strip_host(link: &str) -> Option<&str> {
    let without_scheme = link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"))
        .unwrap_or(link);
    without_scheme.strip_prefix("open.spotify.com")
}

fn is_playlist_id(id: &str) -> bool {
    id.len() == ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}
