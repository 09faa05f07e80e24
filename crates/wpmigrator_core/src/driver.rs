use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::MigratorConfig;
use crate::error::Result;
use crate::frontmatter::Lookups;
use crate::index::EntityIndex;
use crate::layout::OutputLayout;
use crate::record::{EntityKind, Record};
use crate::sink::FileSink;
use crate::source::{PageSource, fetch_all};
use crate::templater::{DataTemplater, EntityTemplater, PageTemplater, PostTemplater, Templater};

/// Driver states, executed strictly in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    IndexCategories,
    IndexTags,
    TemplateAuthors,
    TemplatePosts,
    TemplatePages,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IndexCategories => "index_categories",
            Self::IndexTags => "index_tags",
            Self::TemplateAuthors => "template_authors",
            Self::TemplatePosts => "template_posts",
            Self::TemplatePages => "template_pages",
            Self::Done => "done",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::IndexCategories => Self::IndexTags,
            Self::IndexTags => Self::TemplateAuthors,
            Self::TemplateAuthors => Self::TemplatePosts,
            Self::TemplatePosts => Self::TemplatePages,
            Self::TemplatePages | Self::Done => Self::Done,
        }
    }

    pub fn kind(self) -> Option<EntityKind> {
        match self {
            Self::IndexCategories => Some(EntityKind::Category),
            Self::IndexTags => Some(EntityKind::Tag),
            Self::TemplateAuthors => Some(EntityKind::Author),
            Self::TemplatePosts => Some(EntityKind::Post),
            Self::TemplatePages => Some(EntityKind::Page),
            Self::Done => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub kind: EntityKind,
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub fetched: usize,
    pub indexed: usize,
    pub written: usize,
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        Self {
            phase,
            fetched: 0,
            indexed: 0,
            written: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, kind: EntityKind, record: &Record, error: &dyn std::error::Error) {
        let id = record.id_or_unknown();
        error!(%kind, id = %id, "failed to template record: {error}");
        self.failures.push(RecordFailure {
            kind,
            id,
            message: error.to_string(),
        });
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub phases: Vec<PhaseReport>,
    pub request_count: usize,
}

impl MigrationReport {
    pub fn success(&self) -> bool {
        self.phases.iter().all(|phase| phase.failures.is_empty())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordFailure> {
        self.phases.iter().flat_map(|phase| phase.failures.iter())
    }

    pub fn written(&self) -> usize {
        self.phases.iter().map(|phase| phase.written).sum()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|report| report.phase == phase)
    }
}

#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub layout: OutputLayout,
    pub filter_tags: Vec<String>,
    pub post_keys: Vec<String>,
    pub page_keys: Vec<String>,
    pub author_keys: Vec<String>,
}

impl MigrationOptions {
    pub fn from_config(config: &MigratorConfig, output_root: impl Into<PathBuf>) -> Self {
        Self {
            layout: OutputLayout::new(output_root, config.pages_dir()),
            filter_tags: config.filter_tags(),
            post_keys: config.post_keys(),
            page_keys: config.page_keys(),
            author_keys: config.author_keys(),
        }
    }
}

/// Runs the migration phases against one source.
///
/// The driver owns every index. Categories and tags are complete before any
/// file is written, and the author index is complete before posts and pages
/// resolve author slugs.
pub struct MigrationDriver<S: PageSource> {
    source: S,
    options: MigrationOptions,
    categories: EntityIndex,
    tags: EntityIndex,
    authors: EntityIndex,
    phase: Phase,
    report: MigrationReport,
}

impl<S: PageSource> MigrationDriver<S> {
    pub fn new(source: S, options: MigrationOptions) -> Self {
        let tags = EntityIndex::with_filter(EntityKind::Tag, options.filter_tags.clone());
        Self {
            source,
            options,
            categories: EntityIndex::new(EntityKind::Category),
            tags,
            authors: EntityIndex::new(EntityKind::Author),
            phase: Phase::IndexCategories,
            report: MigrationReport::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn categories(&self) -> &EntityIndex {
        &self.categories
    }

    pub fn tags(&self) -> &EntityIndex {
        &self.tags
    }

    pub fn authors(&self) -> &EntityIndex {
        &self.authors
    }

    /// Execute every remaining phase. Any error returned here is fatal.
    pub fn run(&mut self) -> Result<MigrationReport> {
        while self.phase != Phase::Done {
            self.step()?;
        }
        self.report.request_count = self.source.request_count();
        Ok(self.report.clone())
    }

    /// Execute the current phase and move to the next one.
    pub fn step(&mut self) -> Result<Phase> {
        let phase = self.phase;
        if phase == Phase::Done {
            return Ok(phase);
        }
        info!(phase = phase.as_str(), "starting phase");

        let mut report = PhaseReport::new(phase);
        match phase {
            Phase::IndexCategories => {
                index_collection(&mut self.source, &mut self.categories, &mut report)?;
            }
            Phase::IndexTags => {
                index_collection(&mut self.source, &mut self.tags, &mut report)?;
                if self.tags.filtered_count() > 0 {
                    info!(
                        filtered_tags = self.tags.filtered_count(),
                        "posts with filtered tags will be skipped"
                    );
                }
            }
            Phase::TemplateAuthors => self.template_authors(&mut report)?,
            Phase::TemplatePosts => {
                let mut templater = EntityTemplater::new(
                    PostTemplater,
                    self.options.post_keys.clone(),
                    FileSink::new(&self.options.layout.posts_dir),
                );
                let lookups = Lookups {
                    tags: &self.tags,
                    categories: &self.categories,
                    authors: Some(&self.authors),
                };
                template_collection(
                    &mut self.source,
                    &mut templater,
                    &lookups,
                    Some(&self.tags),
                    &mut report,
                )?;
            }
            Phase::TemplatePages => {
                let mut templater = EntityTemplater::new(
                    PageTemplater,
                    self.options.page_keys.clone(),
                    FileSink::new(&self.options.layout.pages_dir),
                );
                let lookups = Lookups {
                    tags: &self.tags,
                    categories: &self.categories,
                    authors: Some(&self.authors),
                };
                template_collection(&mut self.source, &mut templater, &lookups, None, &mut report)?;
            }
            Phase::Done => {}
        }

        info!(
            phase = phase.as_str(),
            fetched = report.fetched,
            indexed = report.indexed,
            written = report.written,
            skipped = report.skipped,
            failed = report.failures.len(),
            "finished phase"
        );
        self.report.phases.push(report);
        self.phase = phase.next();
        Ok(self.phase)
    }

    fn template_authors(&mut self, report: &mut PhaseReport) -> Result<()> {
        let mut templater = EntityTemplater::new(
            DataTemplater {
                kind: EntityKind::Author,
            },
            self.options.author_keys.clone(),
            FileSink::new(&self.options.layout.authors_dir),
        );
        templater.sink().ensure_root()?;

        for item in fetch_all(&mut self.source, EntityKind::Author.collection(), Vec::new()) {
            let author = item?;
            report.fetched += 1;
            let lookups = Lookups {
                tags: &self.tags,
                categories: &self.categories,
                authors: None,
            };
            match templater.template(&author, &lookups) {
                Ok(_) => report.written += 1,
                Err(error) => report.record_failure(EntityKind::Author, &author, &error),
            }
            // indexed even when its file failed, so posts still resolve the slug
            self.authors.add(author)?;
            report.indexed += 1;
        }
        Ok(())
    }
}

fn index_collection<S: PageSource>(
    source: &mut S,
    index: &mut EntityIndex,
    report: &mut PhaseReport,
) -> Result<()> {
    for item in fetch_all(source, index.kind().collection(), Vec::new()) {
        let record = item?;
        report.fetched += 1;
        index.add(record)?;
        report.indexed += 1;
    }
    Ok(())
}

fn template_collection<S: PageSource, T: Templater>(
    source: &mut S,
    templater: &mut EntityTemplater<T>,
    lookups: &Lookups<'_>,
    tag_filter: Option<&EntityIndex>,
    report: &mut PhaseReport,
) -> Result<()> {
    templater.sink().ensure_root()?;
    let kind = templater.kind();

    for item in fetch_all(source, kind.collection(), Vec::new()) {
        let record = item?;
        report.fetched += 1;

        if let Some(tags) = tag_filter {
            match record.id_list("tags") {
                Ok(tag_ids) if tags.is_filtered(&tag_ids) => {
                    debug!(
                        %kind,
                        id = %record.id_or_unknown(),
                        title = record.rendered("title").unwrap_or_default(),
                        "skipping record with filtered tag"
                    );
                    report.skipped += 1;
                    continue;
                }
                Ok(_) => {}
                Err(error) => {
                    report.record_failure(kind, &record, &error);
                    continue;
                }
            }
        }

        match templater.template(&record, lookups) {
            Ok(_) => report.written += 1,
            Err(error) => report.record_failure(kind, &record, &error),
        }
    }
    Ok(())
}
