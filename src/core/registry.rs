/// Locale registry: language metadata and precomputed fallback chains.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use crate::schema::locale::{Direction, LocaleEntry, LocaleSpec};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("reference language '{0}' is not registered")]
    MissingReference(String),
    #[error("language '{0}' is registered twice")]
    DuplicateCode(String),
    #[error("language '{code}' falls back to unknown language '{parent}'")]
    UnknownParent { code: String, parent: String },
    #[error("fallback cycle through '{0}'")]
    FallbackCycle(String),
    #[error("reference language '{0}' must not fall back to another language")]
    ReferenceHasParent(String),
    #[error("reference language '{expected}' differs from the registry reference '{actual}'")]
    ReferenceMismatch { expected: String, actual: String },
}

/// The registry document as authored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "Registry")]
struct RegistryDocument {
    reference: String,
    languages: Vec<LocaleSpec>,
}

/// Every supported language, keyed by code, with fallback chains resolved
/// once at load time. Read-only after construction.
#[derive(Debug, Clone)]
pub struct LocaleRegistry {
    reference: String,
    entries: BTreeMap<String, LocaleEntry>,
}

/// The shipped languages: (code, display name, direction, parent).
const BUILTIN_LANGUAGES: &[(&str, &str, Direction, Option<&str>)] = &[
    ("schinese", "简体中文", Direction::Ltr, None),
    ("tchinese", "繁體中文", Direction::Ltr, Some("schinese")),
    ("english", "English", Direction::Ltr, None),
    ("japanese", "日本語", Direction::Ltr, None),
    ("koreana", "한국어", Direction::Ltr, None),
    ("french", "Français", Direction::Ltr, None),
    ("german", "Deutsch", Direction::Ltr, None),
    ("spanish", "Español (España)", Direction::Ltr, None),
    ("latam", "Español (Latinoamérica)", Direction::Ltr, Some("spanish")),
    ("brazilian", "Português (Brasil)", Direction::Ltr, Some("portuguese")),
    ("portuguese", "Português", Direction::Ltr, None),
    ("russian", "Русский", Direction::Ltr, None),
    ("italian", "Italiano", Direction::Ltr, None),
    ("dutch", "Nederlands", Direction::Ltr, None),
    ("polish", "Polski", Direction::Ltr, None),
    ("turkish", "Türkçe", Direction::Ltr, None),
    ("thai", "ไทย", Direction::Ltr, None),
    ("vietnamese", "Tiếng Việt", Direction::Ltr, None),
    ("indonesian", "Bahasa Indonesia", Direction::Ltr, None),
    ("ukrainian", "Українська", Direction::Ltr, None),
    ("czech", "Čeština", Direction::Ltr, None),
    ("hungarian", "Magyar", Direction::Ltr, None),
    ("romanian", "Română", Direction::Ltr, None),
    ("bulgarian", "Български", Direction::Ltr, None),
    ("greek", "Ελληνικά", Direction::Ltr, None),
    ("danish", "Dansk", Direction::Ltr, None),
    ("finnish", "Suomi", Direction::Ltr, None),
    ("norwegian", "Norsk", Direction::Ltr, None),
    ("swedish", "Svenska", Direction::Ltr, None),
    ("arabic", "العربية", Direction::Rtl, None),
];

impl LocaleRegistry {
    /// Build a registry, resolving each language's fallback chain by walking
    /// its parents and ending at the reference language.
    pub fn new(reference: &str, languages: Vec<LocaleSpec>) -> Result<LocaleRegistry, RegistryError> {
        let mut specs: BTreeMap<String, LocaleSpec> = BTreeMap::new();
        for spec in languages {
            if specs.contains_key(&spec.code) {
                return Err(RegistryError::DuplicateCode(spec.code));
            }
            specs.insert(spec.code.clone(), spec);
        }
        match specs.get(reference) {
            None => return Err(RegistryError::MissingReference(reference.to_string())),
            Some(spec) if spec.parent.is_some() => {
                return Err(RegistryError::ReferenceHasParent(reference.to_string()));
            }
            Some(_) => {}
        }

        let mut entries = BTreeMap::new();
        for (code, spec) in &specs {
            let mut chain = vec![code.clone()];
            let mut seen: FxHashSet<&str> = FxHashSet::default();
            seen.insert(code.as_str());
            let mut current = spec;
            // The reference has no parent, so a walk that reaches it ends there.
            while let Some(parent) = current.parent.as_deref() {
                let Some(parent_spec) = specs.get(parent) else {
                    return Err(RegistryError::UnknownParent {
                        code: current.code.clone(),
                        parent: parent.to_string(),
                    });
                };
                if !seen.insert(parent) {
                    return Err(RegistryError::FallbackCycle(code.clone()));
                }
                chain.push(parent.to_string());
                current = parent_spec;
            }
            if current.code != reference {
                chain.push(reference.to_string());
            }
            entries.insert(
                code.clone(),
                LocaleEntry {
                    code: code.clone(),
                    display_name: spec.display_name.clone(),
                    direction: spec.direction,
                    fallback_chain: chain,
                },
            );
        }

        Ok(LocaleRegistry {
            reference: reference.to_string(),
            entries,
        })
    }

    /// Load a registry document from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<LocaleRegistry, RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a registry document from a RON string.
    pub fn parse_ron(input: &str) -> Result<LocaleRegistry, RegistryError> {
        let doc: RegistryDocument = ron::from_str(input)?;
        Self::new(&doc.reference, doc.languages)
    }

    /// The shipped language table with English as reference. Built once per
    /// process and shared read-only.
    pub fn builtin() -> &'static LocaleRegistry {
        static BUILTIN: OnceLock<LocaleRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let specs = BUILTIN_LANGUAGES
                .iter()
                .map(|(code, name, direction, parent)| LocaleSpec {
                    code: code.to_string(),
                    display_name: name.to_string(),
                    direction: *direction,
                    parent: parent.map(str::to_string),
                })
                .collect();
            Self::new("english", specs).unwrap_or_else(|e| panic!("builtin locale table is invalid: {e}"))
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Confirm that `language` is the language every chain ends at.
    pub fn check_reference(&self, language: &str) -> Result<(), RegistryError> {
        if language == self.reference {
            Ok(())
        } else {
            Err(RegistryError::ReferenceMismatch {
                expected: language.to_string(),
                actual: self.reference.clone(),
            })
        }
    }

    pub fn get(&self, code: &str) -> Option<&LocaleEntry> {
        self.entries.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// Registered codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LocaleEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fallback chain for `code`. Unregistered languages get the reference
    /// language alone.
    pub fn chain(&self, code: &str) -> &[String] {
        match self.entries.get(code) {
            Some(entry) => &entry.fallback_chain,
            None => self.reference_chain(),
        }
    }

    /// Direction of a registered language; unregistered codes render as the
    /// reference language does.
    pub fn direction(&self, code: &str) -> Direction {
        self.entries
            .get(code)
            .or_else(|| self.entries.get(&self.reference))
            .map(|e| e.direction)
            .unwrap_or_default()
    }

    /// Codes written right-to-left.
    pub fn rtl_languages(&self) -> Vec<&str> {
        self.entries
            .values()
            .filter(|e| e.direction.is_rtl())
            .map(|e| e.code.as_str())
            .collect()
    }

    /// Which of `required` are absent from this registry, in input order.
    pub fn required_languages_missing<'r>(&self, required: &[&'r str]) -> Vec<&'r str> {
        required
            .iter()
            .copied()
            .filter(|code| !self.entries.contains_key(*code))
            .collect()
    }

    fn reference_chain(&self) -> &[String] {
        // The reference language is always registered, see `new`.
        self.entries
            .get(&self.reference)
            .map(|e| e.fallback_chain.as_slice())
            .unwrap_or_default()
    }
}
