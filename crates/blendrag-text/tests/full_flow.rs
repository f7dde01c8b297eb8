use std::sync::Arc;

use blendrag_core::traits::{RetrievalQuery, Retriever};
use blendrag_core::types::{Chunk, SourceKind};
use blendrag_text::{LexicalIndex, LexicalStore, SparseRetriever};
use tempfile::TempDir;

fn pets(doc: &str) -> Vec<Chunk> {
    ["the cat sat", "dogs bark loudly", "cats and dogs are pets"]
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk::new(doc, i, *t))
        .collect()
}

#[test]
fn bm25_ranks_stemmed_matches_above_unmatched() {
    let index = LexicalIndex::build("pets", &pets("pets"), None).expect("build");
    let ranked = index.score("cat", &[], 0.0, 10).expect("score");
    let ordinals: Vec<usize> = ranked.iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, vec![0, 2, 1]);
    assert!(ranked[0].score > ranked[1].score);
    assert!(ranked[1].score > 0.0);
    assert_eq!(ranked[2].score, 0.0);
    assert!(!ranked[2].matched);
}

#[test]
fn keyword_bonus_is_added_per_matching_keyword() {
    let index = LexicalIndex::build("pets", &pets("pets"), None).expect("build");
    let plain = index.score("dogs", &[], 0.1, 10).expect("score");
    let boosted = index.score("dogs", &["pets".to_string(), "pets".to_string()], 0.1, 10).expect("score");

    let score_of = |rows: &[blendrag_text::ScoredChunk], ordinal: usize| rows.iter().find(|r| r.ordinal == ordinal).map(|r| r.score).unwrap();
    assert!((score_of(&boosted, 2) - score_of(&plain, 2) - 0.1).abs() < 1e-5, "duplicate keywords count once");
    assert!((score_of(&boosted, 1) - score_of(&plain, 1)).abs() < 1e-6);
}

#[test]
fn keywords_alone_can_match() {
    let index = LexicalIndex::build("pets", &pets("pets"), None).expect("build");
    let ranked = index.score("", &["pets".to_string()], 0.1, 10).expect("score");
    assert_eq!(ranked[0].ordinal, 2);
    assert!(ranked[0].matched);
    assert!((ranked[0].score - 0.1).abs() < 1e-6);
    assert!(ranked[1..].iter().all(|r| !r.matched));
}

#[test]
fn empty_query_and_empty_document_yield_nothing() {
    let index = LexicalIndex::build("pets", &pets("pets"), None).expect("build");
    assert!(index.score("  ?! ", &[], 0.1, 10).expect("score").is_empty());
    assert!(index.score("cat", &[], 0.1, 0).expect("score").is_empty());

    let empty = LexicalIndex::build("empty", &[], None).expect("build");
    assert!(empty.is_empty());
    assert!(empty.score("cat", &[], 0.1, 10).expect("score").is_empty());
}

#[test]
fn top_k_truncates() {
    let index = LexicalIndex::build("pets", &pets("pets"), None).expect("build");
    let ranked = index.score("cat", &[], 0.0, 1).expect("score");
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].chunk_id, "pets:0");
}

#[tokio::test]
async fn sparse_retriever_keeps_unmatched_by_default() {
    let store = Arc::new(LexicalStore::in_memory());
    let retriever = SparseRetriever::new(store.clone());
    retriever.index("pets", &pets("pets")).expect("index");

    let hits = retriever.retrieve("pets", &RetrievalQuery::new("cat"), 10).await.expect("retrieve");
    let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["pets:0", "pets:2", "pets:1"]);
    assert_eq!(hits.iter().map(|h| h.source_rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(hits[2].score, 0.0);
    assert!(hits.iter().all(|h| h.source == SourceKind::Sparse));

    let matched_only = SparseRetriever::new(store).include_unmatched(false);
    let hits = matched_only.retrieve("pets", &RetrievalQuery::new("cat"), 10).await.expect("retrieve");
    let ordinals: Vec<usize> = hits.iter().map(|h| h.ordinal).collect();
    assert_eq!(ordinals, vec![0, 2]);
}

#[tokio::test]
async fn unmatched_chunks_trail_in_ordinal_order() {
    let store = Arc::new(LexicalStore::in_memory());
    let retriever = SparseRetriever::new(store);
    retriever.index("pets", &pets("pets")).expect("index");

    let hits = retriever.retrieve("pets", &RetrievalQuery::new("loudly"), 10).await.expect("retrieve");
    assert_eq!(hits.iter().map(|h| h.ordinal).collect::<Vec<_>>(), vec![1, 0, 2]);
    assert!(hits[0].score > 0.0);
    assert!(hits[1..].iter().all(|h| h.score == 0.0));

    let top = retriever.retrieve("pets", &RetrievalQuery::new("loudly"), 2).await.expect("retrieve");
    assert_eq!(top.len(), 2);
}

#[tokio::test]
async fn missing_document_is_not_found_in_store_but_empty_for_retriever() {
    let store = Arc::new(LexicalStore::in_memory());
    let err = store.load("ghost").err().expect("missing");
    assert!(err.is_not_found());

    let retriever = SparseRetriever::new(store);
    let hits = retriever.retrieve("ghost", &RetrievalQuery::new("cat"), 5).await.expect("retrieve");
    assert!(hits.is_empty());
}

#[test]
fn on_disk_store_reloads_evicted_indexes() {
    let tmp = TempDir::new().unwrap();
    let store = LexicalStore::on_disk(tmp.path(), 4);
    let first = store.build("pets", &pets("pets")).expect("build").score("cat", &[], 0.0, 3).expect("score");

    assert!(store.evict("pets").expect("evict"));
    assert_eq!(store.cached_len().unwrap(), 0);
    assert!(store.contains("pets").unwrap());

    let reloaded = store.load("pets").expect("load").score("cat", &[], 0.0, 3).expect("score");
    assert_eq!(first, reloaded);
    assert_eq!(store.cached_len().unwrap(), 1);
}

#[test]
fn on_disk_store_keeps_at_most_capacity_in_memory() {
    let tmp = TempDir::new().unwrap();
    let store = LexicalStore::on_disk(tmp.path(), 1);
    store.build("a", &pets("a")).expect("build a");
    store.build("b", &pets("b")).expect("build b");
    assert_eq!(store.cached_len().unwrap(), 1);

    let a = store.load("a").expect("a comes back from disk");
    assert_eq!(a.document_id(), "a");
    assert_eq!(a.len(), 3);
    assert_eq!(store.cached_len().unwrap(), 1);
}

#[test]
fn delete_removes_memory_and_disk() {
    let tmp = TempDir::new().unwrap();
    let store = LexicalStore::on_disk(tmp.path(), 4);
    store.build("pets", &pets("pets")).expect("build");
    store.delete("pets").expect("delete");
    assert!(!store.contains("pets").unwrap());
    assert!(store.load("pets").err().expect("gone").is_not_found());
}

#[test]
fn rebuild_replaces_previous_chunks() {
    let tmp = TempDir::new().unwrap();
    let store = LexicalStore::on_disk(tmp.path(), 4);
    store.build("doc", &pets("doc")).expect("build");
    store.build("doc", &[Chunk::new("doc", 0, "only birds here")]).expect("rebuild");
    store.evict("doc").unwrap();

    let index = store.load("doc").expect("load");
    assert_eq!(index.len(), 1);
    assert!(index.score("cat", &[], 0.0, 5).expect("score").iter().all(|r| !r.matched));
}

#[test]
fn staged_index_is_invisible_until_committed() {
    let tmp = TempDir::new().unwrap();
    let store = LexicalStore::on_disk(tmp.path(), 4);
    store.build("doc", &pets("doc")).expect("build");

    let staged = store.stage("doc", &[Chunk::new("doc", 0, "only birds here")]).expect("stage");
    let staging = staged.path().expect("on disk").to_path_buf();
    assert!(staging.join("meta.json").exists());
    store.evict("doc").unwrap();
    assert_eq!(store.load("doc").expect("load").len(), 3);

    store.commit(staged).expect("commit");
    assert!(!staging.exists());
    assert_eq!(store.load("doc").expect("load").len(), 1);
    store.evict("doc").unwrap();
    assert_eq!(store.load("doc").expect("reload").len(), 1);
}

#[test]
fn dropped_stage_leaves_the_live_index_alone() {
    let tmp = TempDir::new().unwrap();
    let store = LexicalStore::on_disk(tmp.path(), 4);
    store.build("doc", &pets("doc")).expect("build");

    let staged = store.stage("doc", &[Chunk::new("doc", 0, "only birds here")]).expect("stage");
    let staging = staged.path().expect("on disk").to_path_buf();
    drop(staged);
    assert!(!staging.exists());

    store.evict("doc").unwrap();
    let index = store.load("doc").expect("load");
    assert_eq!(index.len(), 3);
    assert_eq!(index.score("cat", &[], 0.0, 1).expect("score")[0].chunk_id, "doc:0");
}

#[test]
fn in_memory_stage_commits_without_disk() {
    let store = LexicalStore::in_memory();
    let staged = store.stage("doc", &pets("doc")).expect("stage");
    assert!(staged.path().is_none());
    assert!(!store.contains("doc").unwrap());
    store.commit(staged).expect("commit");
    assert!(store.contains("doc").unwrap());
}

#[test]
fn scoring_is_deterministic() {
    let index = LexicalIndex::build("pets", &pets("pets"), None).expect("build");
    let a = index.score("cats dogs", &["pets".into()], 0.1, 10).expect("score");
    for _ in 0..5 {
        assert_eq!(a, index.score("cats dogs", &["pets".into()], 0.1, 10).expect("score"));
    }
}
