/// The content build pipeline: sources → compiled, validated documents.
///
/// Wires together source loading, compilation, link validation and manifest
/// aggregation, and writes the runtime documents once validation passed.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::compiler::Compiler;
use crate::core::config::{Config, ConfigError};
use crate::core::diagnostics::Report;
use crate::core::manifest::{
    case_file, chapter_file, CaseDocument, ChapterDocument, Manifest, ManifestError,
};
use crate::core::registry::{LocaleRegistry, RegistryError};
use crate::core::resolver::BundleError;
use crate::core::source::{SourceError, SourceSet};
use crate::core::validator;
use crate::schema::case::PuzzleCase;
use crate::schema::chapter::Chapter;

/// Registry document location inside the locales directory.
pub const REGISTRY_FILE: &str = "_meta/registry.ron";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one build run.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub chapters: Vec<Chapter>,
    pub cases: Vec<PuzzleCase>,
    /// Compile diagnostics followed by validation diagnostics.
    pub report: Report,
    /// Present only when the report carries no errors.
    pub manifest: Option<Manifest>,
}

impl BuildOutput {
    pub fn exit_code(&self) -> i32 {
        self.report.exit_code()
    }

    /// Write `main/chapter_N.json`, `side/case_N.json` and `manifest.json`
    /// under `dir`. Returns the written paths in order.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, ContentError> {
        let Some(manifest) = &self.manifest else {
            let errors = self.report.errors().count();
            return Err(ManifestError::InvalidContent(errors).into());
        };

        let mut written = Vec::new();
        for chapter in &self.chapters {
            let path = dir.join(chapter_file(chapter.number));
            write_json(&path, &ChapterDocument::new(chapter).to_json_pretty()?)?;
            written.push(path);
        }
        for case in &self.cases {
            let path = dir.join(case_file(case.number));
            write_json(&path, &CaseDocument::new(case).to_json_pretty()?)?;
            written.push(path);
        }
        let path = dir.join("manifest.json");
        write_json(&path, &manifest.to_json_pretty()?)?;
        written.push(path);

        info!(dir = %dir.display(), files = written.len(), "wrote content bundle");
        Ok(written)
    }
}

/// A configured build. Constructed via `ContentPipeline::builder()`.
pub struct ContentPipeline {
    compiler: Compiler,
    sources: SourceSet,
}

/// Builder for configuring and loading a content pipeline.
pub struct ContentPipelineBuilder {
    config: Config,
    sources: Option<SourceSet>,
}

impl ContentPipeline {
    pub fn builder() -> ContentPipelineBuilder {
        ContentPipelineBuilder {
            config: Config::default(),
            sources: None,
        }
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Compile, validate, and aggregate. Never fails: content problems end
    /// up in the report and suppress the manifest.
    pub fn run(&self) -> BuildOutput {
        let compilation = self.compiler.compile_all(&self.sources);
        let mut report = compilation.report;
        report.merge(validator::validate(&compilation.chapters, &compilation.cases));

        let manifest = match Manifest::build(&compilation.chapters, &compilation.cases, &report) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(error = %e, "manifest not built");
                None
            }
        };

        BuildOutput {
            chapters: compilation.chapters,
            cases: compilation.cases,
            report,
            manifest,
        }
    }
}

impl ContentPipelineBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn source_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source_dir = path.into();
        self
    }

    pub fn reference_language(mut self, language: &str) -> Self {
        self.config.reference_language = language.to_string();
        self
    }

    pub fn final_chapter(mut self, number: u32) -> Self {
        self.config.final_chapter = Some(number);
        self
    }

    /// Provide sources directly (for testing without files).
    pub fn with_sources(mut self, sources: SourceSet) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn build(self) -> Result<ContentPipeline, ContentError> {
        let sources = match self.sources {
            Some(sources) => sources,
            None => SourceSet::load_from_dir(&self.config.source_dir)?,
        };
        debug!(
            chapters = sources.chapters.len(),
            cases = sources.cases.len(),
            rejected = sources.rejected.len(),
            "sources loaded"
        );
        Ok(ContentPipeline {
            compiler: Compiler::from_config(&self.config),
            sources,
        })
    }
}

/// Load `<locales_dir>/_meta/registry.ron`, or the builtin table when the
/// directory carries no registry document.
pub fn load_registry(locales_dir: &Path) -> Result<LocaleRegistry, ContentError> {
    let path = locales_dir.join(REGISTRY_FILE);
    if path.is_file() {
        debug!(path = %path.display(), "loading locale registry");
        Ok(LocaleRegistry::load_from_ron(&path)?)
    } else {
        debug!("no registry document, using builtin languages");
        Ok(LocaleRegistry::builtin().clone())
    }
}

/// Write pretty JSON with a trailing newline, creating parent directories.
pub fn write_json(path: &Path, json: &str) -> Result<(), ContentError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}
