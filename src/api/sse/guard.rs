//! Header checks for the MCP endpoint
//!
//! The server answers on a local port, so any web page the user visits could
//! try to talk to it. Requests whose `Origin` or `Host` names something other
//! than a loopback host are refused, which blocks cross-origin and
//! DNS-rebinding requests from browsers.

use std::collections::HashSet;
use std::net::Ipv6Addr;

use axum::http::{header, HeaderMap};

use super::error::HttpError;

pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_EVENT_STREAM: &str = "text/event-stream";

/// Hosts accepted by default, with or without a port
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// Allow-list of host names for `Origin` and `Host` headers
#[derive(Debug, Clone)]
pub struct HostAllowList {
    hosts: HashSet<String>,
}

impl Default for HostAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_HOSTS.iter().copied())
    }
}

impl HostAllowList {
    /// Build from host entries; ports and IPv6 brackets are normalized away
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .filter_map(|h| hostname(h.as_ref()))
            .collect();
        Self { hosts }
    }

    /// Default loopback hosts plus `extra`
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        list.hosts.extend(extra.into_iter().filter_map(|h| hostname(h.as_ref())));
        list
    }

    /// Check a `Host` header value such as `localhost:8000`
    pub fn allows_host(&self, authority: &str) -> bool {
        hostname(authority).is_some_and(|h| self.hosts.contains(&h))
    }

    /// Check an `Origin` header value such as `http://127.0.0.1:8000`
    pub fn allows_origin(&self, origin: &str) -> bool {
        let Some((scheme, rest)) = origin.trim().split_once("://") else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return false;
        }
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if authority.contains('@') {
            return false;
        }
        self.allows_host(authority)
    }

    /// Validate both headers; an absent header is not checked
    pub fn check(&self, headers: &HeaderMap) -> Result<(), HttpError> {
        if let Some(origin) = headers.get(header::ORIGIN) {
            let origin = origin.to_str().unwrap_or_default();
            if !self.allows_origin(origin) {
                return Err(HttpError::Forbidden(format!("origin '{}' is not allowed", origin)));
            }
        }
        if let Some(host) = headers.get(header::HOST) {
            let host = host.to_str().unwrap_or_default();
            if !self.allows_host(host) {
                return Err(HttpError::Forbidden(format!("host '{}' is not allowed", host)));
            }
        }
        Ok(())
    }
}

/// Lowercased host part of an authority, without port or IPv6 brackets
fn hostname(authority: &str) -> Option<String> {
    let authority = authority.trim();
    if authority.is_empty() {
        return None;
    }

    if let Some(rest) = authority.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        if !after.is_empty() && !is_port(after.strip_prefix(':')?) {
            return None;
        }
        return Some(host.to_ascii_lowercase());
    }

    if authority.parse::<Ipv6Addr>().is_ok() {
        return Some(authority.to_ascii_lowercase());
    }

    let host = match authority.rsplit_once(':') {
        Some((host, port)) if is_port(port) => host,
        Some(_) => return None,
        None => authority,
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

fn is_port(s: &str) -> bool {
    !s.is_empty() && s.len() <= 5 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Media types listed in an `Accept` header, lowercased, parameters removed,
/// each paired with whether it was refused with `q=0`
fn accept_entries(headers: &HeaderMap) -> Vec<(String, bool)> {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| (media_type(t).to_ascii_lowercase(), is_refused(t)))
        .filter(|(t, _)| !t.is_empty())
        .collect()
}

/// Whether an `Accept` entry carries a zero quality value
fn is_refused(entry: &str) -> bool {
    entry.split(';').skip(1).any(|param| {
        let Some((name, value)) = param.split_once('=') else {
            return false;
        };
        name.trim().eq_ignore_ascii_case("q")
            && value.trim().parse::<f32>().is_ok_and(|q| q <= 0.0)
    })
}

fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

/// Whether the `Accept` header admits `mime` (wildcards included).
/// An explicit `mime;q=0` refuses it even when a wildcard matches.
pub fn accepts(headers: &HeaderMap, mime: &str) -> bool {
    let major = mime.split('/').next().unwrap_or_default();
    let entries = accept_entries(headers);
    if entries.iter().any(|(t, refused)| *refused && t == mime) {
        return false;
    }
    entries.iter().filter(|(_, refused)| !refused).any(|(t, _)| {
        t == mime || t == "*/*" || t.strip_suffix("/*").is_some_and(|m| m == major)
    })
}

/// Whether the `Accept` header names `mime` explicitly with a nonzero quality
pub fn accepts_exactly(headers: &HeaderMap, mime: &str) -> bool {
    accept_entries(headers)
        .iter()
        .any(|(t, refused)| !refused && t == mime)
}

/// POST bodies must be JSON
pub fn require_json_content_type(headers: &HeaderMap) -> Result<(), HttpError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type)
        .unwrap_or_default();

    if content_type.eq_ignore_ascii_case(APPLICATION_JSON) {
        Ok(())
    } else {
        Err(HttpError::UnsupportedMediaType(content_type.to_string()))
    }
}
