//! Search over an in-memory store with a fake text embedder.

use async_trait::async_trait;
use sampledex_core::model::{AnalysisEngine, SampleRecord};
use sampledex_core::schema::SampleStore;
use sampledex_etl::audio::DecodedAudio;
use sampledex_etl::{Embedder, Result};
use sampledex_search::{SearchFilters, Searcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Maps a few words onto fixed directions.
#[derive(Default)]
struct WordEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model(&self) -> &str {
        "words"
    }

    async fn embed_audio(&self, _audio: &DecodedAudio) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(match text {
            "kick" => vec![1.0, 0.0, 0.0],
            "snare" => vec![0.0, 1.0, 0.0],
            _ => vec![0.0, 0.0, 1.0],
        })
    }
}

fn store_with_samples() -> SampleStore {
    let store = SampleStore::open_in_memory().unwrap();
    let samples = [
        ("Kick_Deep.wav", vec![1.0, 0.1, 0.0], Some(120.0)),
        ("Kick_Punchy.wav", vec![0.9, 0.3, 0.0], Some(90.0)),
        ("Snare_Tight.wav", vec![0.1, 1.0, 0.0], None),
        ("Pad_Warm.flac", vec![0.0, 0.2, 1.0], Some(100.0)),
    ];
    for (name, embedding, bpm) in samples {
        let mut record = SampleRecord::new(
            PathBuf::from(format!("/samples/{name}")),
            embedding,
            AnalysisEngine::Builtin,
        );
        record.metadata.bpm = bpm;
        store.insert(&record).unwrap();
    }
    store
}

#[tokio::test]
async fn test_results_are_ordered_and_bounded() {
    let store = store_with_samples();
    let embedder = WordEmbedder::default();
    let searcher = Searcher::new(&store, &embedder);

    let hits = searcher.search("kick", 2, &SearchFilters::default()).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.filename, "Kick_Deep.wav");
    assert_eq!(hits[1].record.filename, "Kick_Punchy.wav");
    assert!(hits[0].similarity >= hits[1].similarity);
    assert!(hits.iter().all(|h| (0.0..=100.0).contains(&h.similarity)));
}

#[tokio::test]
async fn test_blank_query_skips_embedding() {
    let store = store_with_samples();
    let embedder = WordEmbedder::default();
    let searcher = Searcher::new(&store, &embedder);

    let hits = searcher.search("   ", 10, &SearchFilters::default()).await.unwrap();
    assert!(hits.is_empty());
    assert_eq!(embedder.calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_filters_apply_after_query() {
    let store = store_with_samples();
    let embedder = WordEmbedder::default();
    let searcher = Searcher::new(&store, &embedder);

    let filters = SearchFilters {
        min_bpm: 100.0,
        max_bpm: 130.0,
        ..SearchFilters::default()
    };
    let hits = searcher.search("kick", 10, &filters).await.unwrap();
    let names: Vec<_> = hits.iter().map(|h| h.record.filename.as_str()).collect();
    // Snare has no BPM and passes the tempo filter.
    assert_eq!(names, vec!["Kick_Deep.wav", "Snare_Tight.wav", "Pad_Warm.flac"]);

    let filters = SearchFilters {
        exclude: Some("kick".to_string()),
        ..SearchFilters::default()
    };
    let hits = searcher.search("kick", 10, &filters).await.unwrap();
    assert!(hits.iter().all(|h| !h.record.filename.starts_with("Kick")));
}

#[tokio::test]
async fn test_hits_serialize_to_json() {
    let store = store_with_samples();
    let embedder = WordEmbedder::default();
    let searcher = Searcher::new(&store, &embedder);

    let hits = searcher.search("snare", 1, &SearchFilters::default()).await.unwrap();
    let json = serde_json::to_value(&hits).unwrap();
    assert_eq!(json[0]["record"]["filename"], "Snare_Tight.wav");
    assert!(json[0]["similarity"].as_f64().unwrap() > 90.0);
}
