//! Ingestion-side chunking of already-extracted document text.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ChunkingConfig;
use crate::types::Chunk;

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Reads one extracted-text file and chunks it under `document_id`.
    pub fn process_file(&self, document_id: &str, file_path: &Path) -> Result<Vec<Chunk>> {
        let content = self.read_file_content(file_path)?;
        let source = file_path.to_string_lossy().to_string();
        let chunks: Vec<Chunk> = self
            .chunk_text(document_id, &content)
            .into_iter()
            .map(|c| c.with_metadata("source", source.clone()))
            .collect();
        info!(document_id, chunks = chunks.len(), path = %file_path.display(), "chunked document");
        Ok(chunks)
    }

    /// Every `.txt` file under `data_dir`, each becoming one document named by its file stem.
    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<(String, Vec<Chunk>)>> {
        let files = self.list_txt_files(data_dir);
        if files.is_empty() {
            info!("No .txt files found under {}.", data_dir.display());
            return Ok(vec![]);
        }
        let mut documents = Vec::with_capacity(files.len());
        for file_path in &files {
            let document_id = Self::document_id_for(file_path);
            let chunks = self.process_file(&document_id, file_path)?;
            documents.push((document_id, chunks));
        }
        Ok(documents)
    }

    /// Splits `text` into overlapping word windows. Ordinals are dense from 0.
    pub fn chunk_text(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let size = self.chunking_config.words_per_chunk.max(1);
        let step = size.saturating_sub(self.chunking_config.overlap_words).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + size).min(words.len());
            chunks.push(Chunk::new(document_id, chunks.len(), words[start..end].join(" ")));
            if end >= words.len() { break; }
            start += step;
        }
        let total = chunks.len().to_string();
        for chunk in &mut chunks { chunk.metadata.insert("total_chunks".to_string(), total.clone()); }
        chunks
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    pub fn document_id_for(file_path: &Path) -> String {
        file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| file_path.to_string_lossy().to_string())
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}
