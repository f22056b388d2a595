use anyhow::{Context, Result};
use crossterm::style::{Color, Stylize};
use sampledex_core::model::{AudioFormat, MusicalKey};
use sampledex_core::paths::to_file_url;
use sampledex_core::schema::SampleStore;
use sampledex_etl::index::EMBEDDING_MODEL_INFO;
use sampledex_etl::{Config, HttpEmbedder};
use sampledex_search::{SearchFilters, SearchHit, Searcher, SimilarityBand};
use std::path::Path;

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    /// What the sample should sound like, e.g. "dusty vinyl snare"
    pub query: String,

    /// Number of results
    #[arg(short = 'k', long, default_value_t = 10)]
    pub top_k: usize,

    /// Only file names matching this regex (case-insensitive)
    #[arg(long)]
    pub include: Option<String>,

    /// Drop file names matching this regex (case-insensitive)
    #[arg(long)]
    pub exclude: Option<String>,

    /// Minimum similarity in percent
    #[arg(long, default_value_t = 0.0, value_parser = parse_percent)]
    pub min_sim: f64,

    /// Maximum similarity in percent
    #[arg(long, default_value_t = 100.0, value_parser = parse_percent)]
    pub max_sim: f64,

    #[arg(long)]
    pub min_bpm: Option<f64>,

    #[arg(long)]
    pub max_bpm: Option<f64>,

    /// Minimum duration in seconds
    #[arg(long)]
    pub min_dur: Option<f64>,

    /// Maximum duration in seconds
    #[arg(long)]
    pub max_dur: Option<f64>,

    /// Exact key, e.g. "A min" or "F# maj"
    #[arg(long)]
    pub key: Option<MusicalKey>,

    /// File format, e.g. wav
    #[arg(long)]
    pub format: Option<AudioFormat>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Print file:// URLs instead of paths
    #[arg(long)]
    pub urls: bool,
}

/// Parse a similarity percentage in `0..=100`.
fn parse_percent(value: &str) -> std::result::Result<f64, String> {
    let percent: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("not a number: {value:?}"))?;
    if (0.0..=100.0).contains(&percent) {
        Ok(percent)
    } else {
        Err(format!("{value} is outside 0-100"))
    }
}

impl SearchArgs {
    /// Filters for the search.
    ///
    /// # Errors
    /// Returns an error if `--min-sim` is above `--max-sim`.
    pub fn filters(&self) -> Result<SearchFilters> {
        if self.min_sim > self.max_sim {
            anyhow::bail!(
                "--min-sim ({}) is above --max-sim ({})",
                self.min_sim,
                self.max_sim
            );
        }
        let defaults = SearchFilters::default();
        Ok(SearchFilters {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            min_similarity: self.min_sim,
            max_similarity: self.max_sim,
            min_bpm: self.min_bpm.unwrap_or(defaults.min_bpm),
            max_bpm: self.max_bpm.unwrap_or(defaults.max_bpm),
            key: self.key,
            format: self.format,
            min_duration: self.min_dur.unwrap_or(defaults.min_duration),
            max_duration: self.max_dur.unwrap_or(defaults.max_duration),
        })
    }
}

/// Terminal colour for a similarity band.
pub const fn band_color(band: SimilarityBand) -> Color {
    match band {
        SimilarityBand::Excellent => Color::Green,
        SimilarityBand::Strong => Color::DarkGreen,
        SimilarityBand::Good => Color::Yellow,
        SimilarityBand::Fair => Color::DarkYellow,
        SimilarityBand::Weak => Color::Red,
        SimilarityBand::Poor => Color::DarkRed,
    }
}

/// Warn when the database was built with a different embedding model than
/// the one queries will be embedded with.
pub fn check_model(store: &SampleStore, config: &Config) -> Result<()> {
    if let Some(indexed_with) = store.info(EMBEDDING_MODEL_INFO)? {
        if indexed_with != config.embedding.model {
            log::warn!(
                "Database was indexed with {} but queries use {}; results will be meaningless",
                indexed_with,
                config.embedding.model
            );
        }
    }
    Ok(())
}

pub async fn run_search(args: &SearchArgs, db_path: &Path, config: &Config) -> Result<()> {
    let filters = args.filters()?;
    let store = SampleStore::open_existing(db_path)?;
    check_model(&store, config)?;

    let embedder = HttpEmbedder::new(&config.embedding)?;
    let searcher = Searcher::new(&store, &embedder);

    let hits = searcher.search(&args.query, args.top_k, &filters).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&hits).context("Failed to serialize results")?;
        println!("{json}");
        return Ok(());
    }

    print_hits(&args.query, &hits, &filters, args.urls);
    Ok(())
}

fn print_hits(query: &str, hits: &[SearchHit], filters: &SearchFilters, urls: bool) {
    println!("\n🔎 \"{}\"", query);
    let active = filters.describe();
    if !active.is_empty() {
        println!("   filters: {active}");
    }
    println!();

    if hits.is_empty() {
        println!("  No matching samples.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let metadata = &hit.record.metadata;
        let band = SimilarityBand::from_percent(hit.similarity);
        let similarity = format!("{:5.1}%", hit.similarity).with(band_color(band));

        let bpm = metadata
            .bpm
            .map(|bpm| format!("{bpm:.0} bpm"))
            .unwrap_or_else(|| "-".to_string());
        let key = metadata
            .key
            .map(|key| key.to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:>3}. {}  {}  [{} | {} | {}]",
            i + 1,
            similarity,
            hit.record.filename.as_str().bold(),
            bpm,
            key,
            metadata.analysis_engine
        );

        let location = hit.record.path.display().to_string();
        if urls {
            println!("      {}", to_file_url(&location).dark_grey());
        } else {
            println!("      {}", location.dark_grey());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: SearchArgs,
    }

    #[test]
    fn test_unset_ranges_keep_defaults() {
        let wrapper = Wrapper::parse_from(["search", "warm pad"]);
        assert_eq!(wrapper.args.top_k, 10);
        assert_eq!(wrapper.args.filters().unwrap(), SearchFilters::default());
    }

    #[test]
    fn test_flags_become_filters() {
        let wrapper = Wrapper::parse_from([
            "search",
            "kick",
            "--min-bpm",
            "120",
            "--max-dur",
            "2",
            "--key",
            "A min",
            "--format",
            "wav",
            "--exclude",
            "808",
        ]);
        let filters = wrapper.args.filters().unwrap();
        assert!((filters.min_bpm - 120.0).abs() < f64::EPSILON);
        assert!((filters.max_bpm - 300.0).abs() < f64::EPSILON);
        assert!((filters.max_duration - 2.0).abs() < f64::EPSILON);
        assert_eq!(filters.key.map(|k| k.to_string()).as_deref(), Some("A min"));
        assert_eq!(filters.format, Some(AudioFormat::Wav));
        assert_eq!(filters.exclude.as_deref(), Some("808"));
    }

    #[test]
    fn test_similarity_bounds_outside_percent_are_rejected() {
        assert!(Wrapper::try_parse_from(["search", "kick", "--min-sim", "150"]).is_err());
        assert!(Wrapper::try_parse_from(["search", "kick", "--max-sim", "-5"]).is_err());
        assert!(Wrapper::try_parse_from(["search", "kick", "--min-sim", "NaN"]).is_err());

        let wrapper =
            Wrapper::parse_from(["search", "kick", "--min-sim", "0", "--max-sim", "100"]);
        assert_eq!(wrapper.args.filters().unwrap(), SearchFilters::default());
    }

    #[test]
    fn test_swapped_similarity_bounds_are_rejected() {
        let wrapper = Wrapper::parse_from(["search", "kick", "--min-sim", "80", "--max-sim", "20"]);
        let err = wrapper.args.filters().unwrap_err();
        assert!(err.to_string().contains("--min-sim"));

        let wrapper = Wrapper::parse_from(["search", "kick", "--min-sim", "40", "--max-sim", "40"]);
        let filters = wrapper.args.filters().unwrap();
        assert!((filters.min_similarity - 40.0).abs() < f64::EPSILON);
        assert!((filters.max_similarity - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_band_colors_differ() {
        assert_ne!(
            band_color(SimilarityBand::Excellent),
            band_color(SimilarityBand::Poor)
        );
    }
}
