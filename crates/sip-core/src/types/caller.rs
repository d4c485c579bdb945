//! Identity helpers for name-addr header values (From, To, Contact)

/// Fallback caller identity when nothing usable is present
pub const UNKNOWN_CALLER: &str = "Unknown";

/// Best-effort caller identity from a From header value.
///
/// In order of preference: the quoted display name, an unquoted display
/// name, the user part of the bracketed URI, the user part of a bare URI,
/// otherwise [`UNKNOWN_CALLER`].
pub fn caller_id(from: &str) -> String {
    let from = from.trim();

    if let Some(rest) = from.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            let name = rest[..end].trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }

    if let Some(open) = from.find('<') {
        let display = from[..open].trim().trim_matches('"').trim();
        if !display.is_empty() {
            return display.to_string();
        }
    }

    uri_user(header_uri(from))
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
}

/// URI portion of a name-addr or addr-spec header value
pub fn header_uri(value: &str) -> &str {
    let value = value.trim();
    if let Some(open) = value.find('<') {
        let rest = &value[open + 1..];
        return rest.find('>').map_or(rest, |close| &rest[..close]).trim();
    }
    // addr-spec form: header parameters follow the first ';'
    value.split(';').next().unwrap_or("").trim()
}

/// User part of a SIP URI (`sip:user@host` → `user`)
pub fn uri_user(uri: &str) -> Option<&str> {
    let uri = uri.trim();
    let rest = uri
        .strip_prefix("sips:")
        .or_else(|| uri.strip_prefix("sip:"))
        .or_else(|| uri.strip_prefix("tel:").map(|r| r.split(';').next().unwrap_or(r)))?;
    match rest.find('@') {
        Some(at) => {
            let user = rest[..at].split(';').next().unwrap_or("");
            let user = user.split(':').next().unwrap_or("");
            (!user.is_empty()).then_some(user)
        }
        None if uri.starts_with("tel:") => (!rest.is_empty()).then_some(rest),
        None => None,
    }
}

/// Host part of a SIP URI without port or parameters
pub fn uri_host(uri: &str) -> Option<&str> {
    let uri = uri.trim();
    let rest = uri
        .strip_prefix("sips:")
        .or_else(|| uri.strip_prefix("sip:"))?;
    let after_user = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
    let host = after_user
        .split(|c: char| c == ';' || c == '?' || c == '>')
        .next()
        .unwrap_or("");
    let host = if host.starts_with('[') {
        host.split(']').next().map(|h| h.trim_start_matches('[')).unwrap_or("")
    } else {
        host.split(':').next().unwrap_or("")
    };
    (!host.is_empty()).then_some(host)
}

/// `tag` parameter of a From/To header value
pub fn header_tag(value: &str) -> Option<&str> {
    let params = match value.find('>') {
        Some(close) => &value[close + 1..],
        None => value,
    };
    params
        .split(';')
        .skip(if value.contains('>') { 0 } else { 1 })
        .filter_map(|p| p.trim().split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("tag"))
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// Append `;tag=...` unless the value already carries a tag
pub fn with_tag(value: &str, tag: &str) -> String {
    if header_tag(value).is_some() {
        value.to_string()
    } else {
        format!("{};tag={}", value.trim_end(), tag)
    }
}
