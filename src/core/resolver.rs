/// Localized text resolution with registry fallback chains, plus the
/// translation-coverage audit.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::diagnostics::Diagnostic;
use crate::core::registry::LocaleRegistry;
use crate::schema::case::PuzzleCase;
use crate::schema::chapter::Chapter;
use crate::schema::locale::Direction;
use crate::schema::node::{LocalizedText, Next};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("locale directory not found: {0}")]
    MissingDir(PathBuf),
}

/// All text of one translatable surface: key → language → string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextBundle {
    pub surface: String,
    pub entries: BTreeMap<String, LocalizedText>,
}

impl TextBundle {
    pub fn new(surface: &str) -> Self {
        Self {
            surface: surface.to_string(),
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: &str, language: &str, text: &str) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .insert(language.to_string(), text.to_string());
    }

    fn insert_all(&mut self, key: String, text: &LocalizedText) {
        let slot = self.entries.entry(key).or_default();
        for (language, value) in text {
            slot.insert(language.clone(), value.clone());
        }
    }

    /// Build from per-language flat maps (language → key → string).
    pub fn from_flat(surface: &str, languages: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let mut bundle = Self::new(surface);
        for (language, strings) in languages {
            for (key, text) in strings {
                bundle
                    .entries
                    .entry(key)
                    .or_default()
                    .insert(language.clone(), text);
            }
        }
        bundle
    }

    /// Load `<dir>/<language>/<file_name>` for every language directory.
    ///
    /// Directories starting with `_` hold metadata and are skipped, as are
    /// language directories without the file.
    pub fn load_json_dir(surface: &str, dir: &Path, file_name: &str) -> Result<Self, BundleError> {
        if !dir.is_dir() {
            return Err(BundleError::MissingDir(dir.to_path_buf()));
        }

        let mut language_dirs = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.is_dir() && !name.starts_with('_') {
                language_dirs.push((name.to_string(), path.clone()));
            }
        }
        language_dirs.sort();

        let mut languages = BTreeMap::new();
        for (language, path) in language_dirs {
            let file = path.join(file_name);
            if !file.is_file() {
                debug!(language = %language, path = %file.display(), "no bundle file for language");
                continue;
            }
            let contents = std::fs::read_to_string(&file)?;
            let strings: BTreeMap<String, String> =
                serde_json::from_str(&contents).map_err(|source| BundleError::Json {
                    path: file.clone(),
                    source,
                })?;
            debug!(language = %language, keys = strings.len(), "loaded bundle file");
            languages.insert(language, strings);
        }

        Ok(Self::from_flat(surface, languages))
    }

    /// Chapter titles, node text, and choice option text.
    pub fn from_chapters(chapters: &[Chapter]) -> Self {
        let mut bundle = Self::new("chapters");
        for chapter in chapters {
            bundle.insert_all(format!("chapter.{}.title", chapter.number), &chapter.title);
            for node in &chapter.nodes {
                bundle.insert_all(format!("{}.text", node.id), &node.text);
                if let Next::Choice(options) = &node.next {
                    for (i, option) in options.iter().enumerate() {
                        bundle.insert_all(format!("{}.option.{}", node.id, i), &option.text);
                    }
                }
            }
        }
        bundle
    }

    /// Case titles, scenarios, solutions, hints, and question text.
    pub fn from_cases(cases: &[PuzzleCase]) -> Self {
        let mut bundle = Self::new("cases");
        for case in cases {
            let id = &case.case_id;
            bundle.insert_all(format!("{id}.title"), &case.title);
            bundle.insert_all(format!("{id}.scenario"), &case.scenario);
            bundle.insert_all(format!("{id}.solution"), &case.solution);
            for (i, hint) in case.hints.iter().enumerate() {
                bundle.insert_all(format!("{id}.hint.{i}"), hint);
            }
            for question in &case.questions {
                bundle.insert_all(format!("{id}.{}.text", question.id), &question.text);
            }
        }
        bundle
    }

    pub fn get(&self, key: &str, language: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|text| text.get(language))
            .map(String::as_str)
    }

    /// Every language that has at least one string.
    pub fn languages(&self) -> BTreeSet<&str> {
        self.entries
            .values()
            .flat_map(|text| text.keys().map(String::as_str))
            .collect()
    }

    /// Keys translated into `language`.
    pub fn keys_for(&self, language: &str) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|(_, text)| text.contains_key(language))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub text: String,
    /// Language the text was actually taken from.
    pub resolved_from: String,
    /// Direction of `resolved_from`, not of the requested language.
    pub direction: Direction,
    /// The requested language is not in the registry.
    pub unregistered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MissingKey {
    pub key: String,
    pub language: String,
    /// The requested language is not in the registry.
    pub unregistered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Found(Resolved),
    Missing(MissingKey),
}

impl Resolution {
    /// Text to render. A miss renders as its key.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Found(resolved) => &resolved.text,
            Self::Missing(missing) => &missing.key,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }

    pub fn found(&self) -> Option<&Resolved> {
        match self {
            Self::Found(resolved) => Some(resolved),
            Self::Missing(_) => None,
        }
    }
}

/// Resolves keys of one bundle against the registry's fallback chains.
/// Never fails; misses accumulate for later reporting.
#[derive(Debug)]
pub struct Resolver<'a> {
    bundle: &'a TextBundle,
    registry: &'a LocaleRegistry,
    misses: BTreeSet<MissingKey>,
}

impl<'a> Resolver<'a> {
    pub fn new(bundle: &'a TextBundle, registry: &'a LocaleRegistry) -> Self {
        Self {
            bundle,
            registry,
            misses: BTreeSet::new(),
        }
    }

    pub fn resolve(&mut self, key: &str, language: &str) -> Resolution {
        let unregistered = !self.registry.contains(language);
        if unregistered {
            debug!(language = %language, "unregistered language, using reference chain");
        }

        for candidate in self.registry.chain(language) {
            if let Some(text) = self.bundle.get(key, candidate) {
                return Resolution::Found(Resolved {
                    text: text.to_string(),
                    resolved_from: candidate.clone(),
                    direction: self.registry.direction(candidate),
                    unregistered,
                });
            }
        }

        warn!(
            surface = %self.bundle.surface,
            key = %key,
            language = %language,
            unregistered,
            "missing translation key"
        );
        let missing = MissingKey {
            key: key.to_string(),
            language: language.to_string(),
            unregistered,
        };
        self.misses.insert(missing.clone());
        Resolution::Missing(missing)
    }

    /// Misses seen so far, sorted by key then language.
    pub fn misses(&self) -> &BTreeSet<MissingKey> {
        &self.misses
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.misses
            .iter()
            .map(|m| Diagnostic::MissingTranslationKey {
                surface: self.bundle.surface.clone(),
                language: m.language.clone(),
                key: m.key.clone(),
            })
            .collect()
    }
}

/// Missing keys per language relative to a reference language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub surface: String,
    pub reference: String,
    pub reference_keys: usize,
    /// Every audited language, including fully translated ones.
    pub missing: BTreeMap<String, BTreeSet<String>>,
}

impl AuditReport {
    pub fn missing_for(&self, language: &str) -> Option<&BTreeSet<String>> {
        self.missing.get(language)
    }

    /// Percentage of reference keys present in `language`.
    pub fn coverage(&self, language: &str) -> Option<f64> {
        let missing = self.missing.get(language)?;
        if self.reference_keys == 0 {
            return Some(100.0);
        }
        let present = self.reference_keys.saturating_sub(missing.len());
        Some(present as f64 * 100.0 / self.reference_keys as f64)
    }

    pub fn is_complete(&self) -> bool {
        self.missing.values().all(BTreeSet::is_empty)
    }

    /// Languages with at least one missing key.
    pub fn incomplete_languages(&self) -> impl Iterator<Item = &str> {
        self.missing
            .iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(language, _)| language.as_str())
    }

    pub fn total_missing(&self) -> usize {
        self.missing.values().map(BTreeSet::len).sum()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.missing
            .iter()
            .flat_map(|(language, keys)| {
                keys.iter().map(move |key| Diagnostic::MissingTranslationKey {
                    surface: self.surface.clone(),
                    language: language.clone(),
                    key: key.clone(),
                })
            })
            .collect()
    }
}

/// Set difference between the reference key set and each language's key
/// set. Audits every registered language plus any language present in the
/// bundle.
pub fn audit(bundle: &TextBundle, registry: &LocaleRegistry, reference: &str) -> AuditReport {
    let reference_keys = bundle.keys_for(reference);

    let mut languages: BTreeSet<&str> = registry.codes().collect();
    languages.extend(bundle.languages());
    languages.remove(reference);

    let missing: BTreeMap<String, BTreeSet<String>> = languages
        .into_iter()
        .map(|language| {
            let present = bundle.keys_for(language);
            let gaps = reference_keys
                .difference(&present)
                .map(|key| key.to_string())
                .collect();
            (language.to_string(), gaps)
        })
        .collect();

    debug!(
        surface = %bundle.surface,
        reference = %reference,
        languages = missing.len(),
        "audited bundle"
    );

    AuditReport {
        surface: bundle.surface.clone(),
        reference: reference.to_string(),
        reference_keys: reference_keys.len(),
        missing,
    }
}
