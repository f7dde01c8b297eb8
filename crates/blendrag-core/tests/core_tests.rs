use std::fs;
use std::io::Write;
use tempfile::TempDir;

use blendrag_core::config::{ChunkingConfig, Config, Settings};
use blendrag_core::data_processor::DataProcessor;
use blendrag_core::types::{FusionStrategy, Intent};

#[test]
fn process_file_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let file_path = tmp.path().join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_file("a", &file_path).expect("process");

    assert_eq!(chunks.len(), 1, "one short text becomes one chunk");
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!(chunks[0].id, "a:0");
    assert!(chunks[0].metadata["source"].ends_with("a.txt"));
}

#[test]
fn chunk_text_windows_overlap() {
    let processor = DataProcessor::with_config(ChunkingConfig { words_per_chunk: 4, overlap_words: 2 });
    let text = "w0 w1 w2 w3 w4 w5 w6";
    let chunks = processor.chunk_text("doc", text);

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["w0 w1 w2 w3", "w2 w3 w4 w5", "w4 w5 w6"]);
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.ordinal, i);
        assert_eq!(c.metadata["total_chunks"], "3");
    }
}

#[test]
fn chunk_text_empty_input_has_no_chunks() {
    assert!(DataProcessor::new().chunk_text("doc", "   \n ").is_empty());
}

#[test]
fn process_directory_names_documents_by_stem() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("alpha.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("beta.txt"), "charlie delta").unwrap();
    fs::write(dir.join("skip.md"), "not text").unwrap();

    let docs = DataProcessor::new().process_directory(dir).expect("process");
    let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["alpha", "beta"]);
}

#[test]
fn settings_defaults_match_documented_values() {
    let s = Settings::default();
    assert_eq!(s.retrieval.top_k, 5);
    assert_eq!(s.retrieval.max_rounds, 2);
    assert!((s.retrieval.alpha - 0.6).abs() < 1e-6);
    assert!((s.retrieval.rrf_k - 60.0).abs() < 1e-6);
    assert_eq!(s.retrieval.strategy, FusionStrategy::Auto);
    assert_eq!(s.refiner.max_keywords, 10);
    assert_eq!(s.embedding.dim, 384);

    let fact = s.refiner.weights_for(Intent::Fact);
    assert!((fact.sparse - 0.6).abs() < 1e-6 && (fact.dense - 0.4).abs() < 1e-6);
    let howto = s.refiner.weights_for(Intent::Howto);
    assert!((howto.dense - 0.6).abs() < 1e-6);
    assert!(s.validate().is_ok());
}

#[test]
fn figment_layers_override_defaults() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [retrieval]
            alpha = 0.8
            strategy = "rrf"

            [refiner.intent_weights.fact]
            dense = 0.2
            sparse = 0.8
            "#,
        )?;
        jail.set_env("APP_RETRIEVAL__TOP_K", "7");
        jail.set_env("RUST_ENV", "test");

        let config = Config::load().expect("load");
        let settings = config.settings().expect("settings");
        assert!((settings.retrieval.alpha - 0.8).abs() < 1e-6);
        assert_eq!(settings.retrieval.strategy, FusionStrategy::Rrf);
        assert_eq!(settings.retrieval.top_k, 7);
        assert!((settings.refiner.weights_for(Intent::Fact).sparse - 0.8).abs() < 1e-6);
        // untouched tables keep their defaults
        assert!((settings.refiner.weights_for(Intent::Summary).dense - 0.6).abs() < 1e-6);
        assert_eq!(config.get::<usize>("retrieval.max_rounds").expect("get"), 2);
        Ok(())
    });
}

#[test]
fn invalid_alpha_is_rejected() {
    let mut s = Settings::default();
    s.retrieval.alpha = 1.5;
    assert!(s.validate().is_err());
}
