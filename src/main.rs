//! bib-linker: link crawled citation records to a reference collection.
//!
//! Usage:
//!   bib-linker --config linker.toml
//!   bib-linker --config linker.toml --features tap --similarity cosine
//!   bib-linker --references-path dblp.jsonl --sources-path crawl.jsonl --output-stats false

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use ahash::AHashSet;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bib_linker::linker::Linked;
use bib_linker::resources::{
    load_known_matches, load_page_counts, load_stop_words, read_publications, read_source_records,
};
use bib_linker::{
    IndexWriter, KnownMatches, LinkRun, MergedRecord, PageCountNormalizer, RecordLinker,
    RunConfig, RunSettings, StopWords, TitleNormalizer,
};

/// Command-line arguments; every setting overrides the config file.
#[derive(Parser, Debug)]
#[command(name = "bib-linker")]
#[command(about = "Link noisy bibliographic records to a curated reference collection")]
#[command(version)]
struct Args {
    /// TOML file with run settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Minimum title similarity (0.0-1.0)
    #[arg(short = 't', long)]
    threshold: Option<f64>,

    /// JACCARD or COSINE
    #[arg(short = 's', long)]
    similarity: Option<String>,

    /// AND or OR
    #[arg(short = 'o', long)]
    operator: Option<String>,

    /// Phrase width of OR queries
    #[arg(short = 'n', long)]
    n_grams: Option<usize>,

    /// Largest accepted page-count difference
    #[arg(long)]
    page_limit: Option<u32>,

    #[arg(long)]
    remove_stopwords: Option<bool>,

    /// Gates to apply: any of t(itle), a(uthors), p(age count), v(enue)
    #[arg(short = 'f', long)]
    features: Option<String>,

    #[arg(long)]
    write_merged_files: Option<bool>,

    #[arg(long)]
    output_stats: Option<bool>,

    /// 1 (info), 2 (debug) or 3 (trace)
    #[arg(short = 'v', long)]
    verbosity: Option<u8>,

    #[arg(long)]
    references_path: Option<PathBuf>,

    #[arg(long)]
    sources_path: Option<PathBuf>,

    #[arg(long)]
    output_folder: Option<PathBuf>,

    #[arg(long)]
    merged_path: Option<PathBuf>,

    #[arg(long)]
    stats_path: Option<PathBuf>,

    #[arg(long)]
    hits_path: Option<PathBuf>,

    #[arg(long)]
    stop_words_path: Option<PathBuf>,

    #[arg(long)]
    matches_path: Option<PathBuf>,

    #[arg(long)]
    page_count_path: Option<PathBuf>,

    #[arg(long)]
    log_path: Option<PathBuf>,
}

impl Args {
    fn overrides(self) -> RunSettings {
        RunSettings {
            threshold: self.threshold,
            similarity: self.similarity,
            operator: self.operator,
            n_grams: self.n_grams,
            page_limit: self.page_limit,
            remove_stopwords: self.remove_stopwords,
            features: self.features,
            write_merged_files: self.write_merged_files,
            output_stats: self.output_stats,
            verbosity: self.verbosity,
            references_path: self.references_path,
            sources_path: self.sources_path,
            output_folder: self.output_folder,
            merged_path: self.merged_path,
            stats_path: self.stats_path,
            hits_path: self.hits_path,
            stop_words_path: self.stop_words_path,
            matches_path: self.matches_path,
            page_count_path: self.page_count_path,
            log_path: self.log_path,
        }
    }
}

fn main() -> Result<()> {
    let started = Instant::now();
    let mut args = Args::parse();

    let base = match args.config.take() {
        Some(path) => RunSettings::from_file(&path)?,
        None => RunSettings::default(),
    };
    let config = base
        .overlay(args.overrides())
        .resolve()
        .context("invalid configuration")?;

    init_tracing(&config)?;
    info!("{config}");

    let summary = run(&config)?;
    info!(
        linked = summary.linked,
        matched = summary.matched,
        skipped = summary.skipped,
        "program finishes, runtime (s): {:.3}",
        started.elapsed().as_secs_f64()
    );

    if let (Some(path), Some(evaluation)) = (&config.stats, summary.evaluation) {
        let mut out = create(path)?;
        writeln!(out, "{}\n", config.features)?;
        writeln!(out, "{evaluation}")?;
        write!(out, "Runtime(s) = {:.3}", started.elapsed().as_secs_f64())?;
        out.flush()?;
        info!(path = %path.display(), "statistics written");
    }
    Ok(())
}

fn init_tracing(config: &RunConfig) -> Result<()> {
    let default_level = match config.verbosity {
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bib_linker={default_level}").into());

    let file_layer = match &config.log {
        Some(path) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(create_file(path)?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

fn run(config: &RunConfig) -> Result<bib_linker::RunSummary> {
    let stop_words = match &config.stop_words {
        Some(path) => load_stop_words(path)
            .with_context(|| format!("reading stop words from {}", path.display()))?,
        None => StopWords::default(),
    };
    let normalizer = TitleNormalizer::new(stop_words);
    let pages = PageCountNormalizer::default();

    let mut writer = IndexWriter::new(&normalizer, &pages).context("creating reference index")?;
    let publications = read_publications(&config.references)
        .with_context(|| format!("opening references {}", config.references.display()))?;
    for publication in publications {
        match publication {
            Ok(publication) => {
                writer.add(publication).context("indexing references")?;
            }
            Err(err) => warn!(%err, "skipping reference entry"),
        }
    }
    let index = writer.finish().context("committing reference index")?;

    let sources: Vec<_> = read_source_records(&config.sources)
        .with_context(|| format!("opening sources {}", config.sources.display()))?
        .collect();

    let page_counts = match &config.page_counts {
        Some(path) if config.features.features.page_count => {
            let ids: AHashSet<String> = sources
                .iter()
                .filter_map(|s| s.as_ref().ok())
                .map(|s| s.id.clone())
                .collect();
            load_page_counts(path, &ids)
                .with_context(|| format!("reading page counts from {}", path.display()))?
        }
        _ => Default::default(),
    };

    let known = match (&config.matches, &config.stats) {
        (Some(path), Some(_)) => load_known_matches(path)
            .with_context(|| format!("reading known matches from {}", path.display()))?,
        _ => KnownMatches::new(),
    };

    let mut hits = config.hits.as_deref().map(create).transpose()?;
    if let Some(out) = hits.as_mut() {
        writeln!(out, "{:<25} {:<15} {:<25}", "doi", "hits", "time")?;
        writeln!(out)?;
    }
    let mut merged = config.merged.as_deref().map(create).transpose()?;

    let linker = RecordLinker::new(&config.features, &normalizer, &index);
    let mut link_run = LinkRun::new(linker);
    if config.features.features.page_count {
        link_run = link_run.with_page_counts(&page_counts);
    }
    if config.stats.is_some() {
        link_run = link_run.with_known_matches(&known);
    }

    let summary = link_run.run(sources, |linked: Linked<'_>| -> Result<()> {
        if let Some(out) = hits.as_mut() {
            writeln!(
                out,
                "{:<25} {:<15} {:<25}",
                linked.source.id,
                linked.result.candidates,
                linked.elapsed.as_secs_f64()
            )?;
        }
        if let (Some(out), Some(reference)) = (merged.as_mut(), &linked.result.best) {
            let record = MergedRecord::merge(linked.source, reference);
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        }
        Ok(())
    })?;

    for out in [hits.as_mut(), merged.as_mut()].into_iter().flatten() {
        out.flush()?;
    }
    Ok(summary)
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output folder {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    create_file(path).map(BufWriter::new)
}
