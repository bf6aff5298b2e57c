use serde::{Deserialize, Serialize};

/// Text direction of a language, consulted by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

impl Direction {
    pub fn is_rtl(&self) -> bool {
        matches!(self, Self::Rtl)
    }
}

/// A language as declared in the registry document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleSpec {
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub direction: Direction,
    /// Language to fall back to before the reference language, typically
    /// the parent of a regional variant.
    #[serde(default)]
    pub parent: Option<String>,
}

/// A registered language with its precomputed fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleEntry {
    pub code: String,
    pub display_name: String,
    pub direction: Direction,
    /// Starts with `code` itself and always ends with the reference language.
    pub fallback_chain: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_default_is_ltr() {
        assert_eq!(Direction::default(), Direction::Ltr);
        assert!(Direction::Rtl.is_rtl());
        assert!(!Direction::Ltr.is_rtl());
    }

    #[test]
    fn spec_from_ron_with_defaults() {
        let spec: LocaleSpec =
            ron::from_str(r#"(code: "latam", display_name: "Español (Latinoamérica)", parent: Some("spanish"))"#)
                .unwrap();
        assert_eq!(spec.code, "latam");
        assert_eq!(spec.direction, Direction::Ltr);
        assert_eq!(spec.parent.as_deref(), Some("spanish"));
    }
}
