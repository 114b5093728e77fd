//! Syntax-highlighting language tags.
//!
//! The tag travels inside the encrypted envelope, so a paste author controls
//! it completely. Anything outside the allowlist is coerced to `plaintext`
//! before it reaches a renderer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Plaintext,
    Javascript,
    Typescript,
    Json,
    Python,
    Java,
    Html,
    Css,
    Go,
    Rust,
    Sql,
    Bash,
    C,
}

impl Language {
    pub const ALL: [Language; 13] = [
        Language::Plaintext,
        Language::Javascript,
        Language::Typescript,
        Language::Json,
        Language::Python,
        Language::Java,
        Language::Html,
        Language::Css,
        Language::Go,
        Language::Rust,
        Language::Sql,
        Language::Bash,
        Language::C,
    ];

    /// Wire tag, as stored inside the envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Plaintext => "plaintext",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Json => "json",
            Language::Python => "python",
            Language::Java => "java",
            Language::Html => "html",
            Language::Css => "css",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Sql => "sql",
            Language::Bash => "bash",
            Language::C => "c",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Language::Plaintext => "Plain Text",
            Language::Javascript => "JavaScript",
            Language::Typescript => "TypeScript",
            Language::Json => "JSON",
            Language::Python => "Python",
            Language::Java => "Java",
            Language::Html => "HTML",
            Language::Css => "CSS",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Sql => "SQL",
            Language::Bash => "Bash",
            Language::C => "C/C++",
        }
    }

    /// `(tag, label)` pairs for pickers and `--help` output.
    pub fn options() -> impl Iterator<Item = (&'static str, &'static str)> {
        Self::ALL.iter().map(|l| (l.as_str(), l.label()))
    }

    /// Strict lookup; `None` for anything outside the allowlist.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == tag)
    }

    /// Lookup that never fails: unknown tags become `Plaintext`.
    pub fn coerce(tag: &str) -> Self {
        Self::parse(tag).unwrap_or_else(|| {
            tracing::debug!(tag_len = tag.len(), "unrecognized language tag, using plaintext");
            Language::Plaintext
        })
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            let valid: Vec<_> = Self::ALL.iter().map(|l| l.as_str()).collect();
            format!("unknown language '{s}' (expected one of: {})", valid.join(", "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_every_tag_roundtrips() {
        for lang in Language::ALL {
            assert_eq!(Language::parse(lang.as_str()), Some(lang));
        }
    }

    #[test]
    fn test_unknown_tags_coerced() {
        assert_eq!(Language::coerce("<script>"), Language::Plaintext);
        assert_eq!(Language::coerce("Rust"), Language::Plaintext);
        assert_eq!(Language::coerce(""), Language::Plaintext);
        assert_eq!(Language::coerce("rust"), Language::Rust);
    }

    #[test]
    fn test_serde_uses_wire_tags() {
        let json = serde_json::to_string(&Language::Typescript).unwrap();
        assert_eq!(json, "\"typescript\"");
        let back: Language = serde_json::from_str("\"c\"").unwrap();
        assert_eq!(back, Language::C);
    }

    #[test]
    fn test_from_str_error_lists_options() {
        let err = "cobol".parse::<Language>().unwrap_err();
        assert!(err.contains("plaintext"));
    }

    proptest! {
        #[test]
        fn coerce_always_lands_in_allowlist(tag in ".*") {
            let lang = Language::coerce(&tag);
            prop_assert!(Language::ALL.contains(&lang));
        }
    }
}
