//! Share-link fragment codec: `#view/<id>[&key=<url-safe base64 key>]`
//!
//! The fragment is never sent to a server. A missing `&key=` means the
//! paste is password protected.

use std::fmt;

use zkpaste_core::{PasteError, PasteResult};

const VIEW_PREFIX: &str = "view/";
const KEY_PARAM: &str = "key=";

/// Longest paste id accepted from a link.
pub const MAX_ID_LEN: usize = 128;

/// Paste ids become URL path segments, so only `[A-Za-z0-9_-]` is allowed.
pub fn is_valid_paste_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Clone, PartialEq, Eq)]
pub struct ShareFragment {
    pub id: String,
    /// Raw exported content key; `None` for password-protected pastes.
    pub key: Option<String>,
}

impl fmt::Debug for ShareFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareFragment")
            .field("id", &self.id)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ShareFragment {
    pub fn new(id: impl Into<String>, key: Option<String>) -> Self {
        Self {
            id: id.into(),
            key,
        }
    }

    /// Parse a full share URL, a `#view/...` fragment, or a bare `view/...`.
    pub fn parse(input: &str) -> PasteResult<Self> {
        let input = input.trim();
        let fragment = match input.split_once('#') {
            Some((_, frag)) => frag,
            None => input,
        };

        let rest = fragment.strip_prefix(VIEW_PREFIX).ok_or_else(|| {
            PasteError::KeyFormat(format!("not a paste link (expected #{VIEW_PREFIX}<id>)"))
        })?;

        let mut parts = rest.split('&');
        let id = parts.next().unwrap_or_default();
        if id.is_empty() {
            return Err(PasteError::KeyFormat("paste link has no id".into()));
        }
        if !is_valid_paste_id(id) {
            return Err(PasteError::KeyFormat("paste id has invalid characters".into()));
        }

        let key = parts
            .find_map(|p| p.strip_prefix(KEY_PARAM))
            .filter(|k| !k.is_empty())
            .map(str::to_owned);

        Ok(Self {
            id: id.to_owned(),
            key,
        })
    }

    /// Render as `#view/<id>[&key=<key>]`.
    pub fn to_fragment(&self) -> String {
        match &self.key {
            Some(key) => format!("#{VIEW_PREFIX}{}&{KEY_PARAM}{key}", self.id),
            None => format!("#{VIEW_PREFIX}{}", self.id),
        }
    }
}

/// origin + path + fragment, e.g. `https://paste.example.com/#view/abc&key=...`.
pub fn share_url(origin: &str, path: &str, fragment: &ShareFragment) -> String {
    let origin = origin.trim_end_matches('/');
    let path = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    format!("{origin}{path}{}", fragment.to_fragment())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_full_url() {
        let f = ShareFragment::parse("https://paste.example.com/#view/abc-123&key=S2V5").unwrap();
        assert_eq!(f.id, "abc-123");
        assert_eq!(f.key.as_deref(), Some("S2V5"));
    }

    #[test]
    fn test_parse_fragment_without_key() {
        let f = ShareFragment::parse("#view/abc").unwrap();
        assert_eq!(f, ShareFragment::new("abc", None));

        let f = ShareFragment::parse("view/abc&key=").unwrap();
        assert_eq!(f.key, None);
    }

    #[test]
    fn test_parse_rejects_other_links() {
        assert!(ShareFragment::parse("https://paste.example.com/").is_err());
        assert!(ShareFragment::parse("#edit/abc").is_err());
        assert!(ShareFragment::parse("#view/").is_err());
        assert!(ShareFragment::parse("#view/&key=abc").is_err());
    }

    #[test]
    fn test_parse_rejects_path_and_query_ids() {
        for link in [
            "#view/..",
            "#view/a?x",
            "#view/a%2Fb",
            "#view/a b",
            "#view/a/b&key=k",
            "#view/..&key=k",
        ] {
            assert!(
                ShareFragment::parse(link).is_err(),
                "{link} must not parse"
            );
        }
        let long = format!("#view/{}", "a".repeat(MAX_ID_LEN + 1));
        assert!(ShareFragment::parse(&long).is_err());
    }

    #[test]
    fn test_fragment_rendering() {
        let with_key = ShareFragment::new("id1", Some("k-_".into()));
        assert_eq!(with_key.to_fragment(), "#view/id1&key=k-_");
        assert_eq!(ShareFragment::parse(&with_key.to_fragment()).unwrap(), with_key);

        assert_eq!(ShareFragment::new("id2", None).to_fragment(), "#view/id2");
    }

    #[test]
    fn test_share_url() {
        let f = ShareFragment::new("x", Some("k".into()));
        assert_eq!(
            share_url("https://paste.example.com/", "/", &f),
            "https://paste.example.com/#view/x&key=k"
        );
        assert_eq!(
            share_url("https://h", "p/", &f),
            "https://h/p/#view/x&key=k"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let f = ShareFragment::new("x", Some("secret".into()));
        assert!(!format!("{f:?}").contains("secret"));
    }

    proptest! {
        #[test]
        fn fragment_roundtrip(
            id in "[A-Za-z0-9_-]{1,64}",
            key in proptest::option::of("[A-Za-z0-9_-]{1,64}"),
        ) {
            let fragment = ShareFragment::new(id, key);
            prop_assert_eq!(ShareFragment::parse(&fragment.to_fragment()).unwrap(), fragment.clone());

            let url = share_url("https://paste.example.com", "/", &fragment);
            prop_assert_eq!(ShareFragment::parse(&url).unwrap(), fragment);
        }

        #[test]
        fn parse_never_yields_unsafe_id(input in ".*") {
            if let Ok(fragment) = ShareFragment::parse(&input) {
                prop_assert!(is_valid_paste_id(&fragment.id));
            }
        }
    }
}
