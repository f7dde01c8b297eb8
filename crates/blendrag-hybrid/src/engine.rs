use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use blendrag_core::config::{expand_path, Settings};
use blendrag_core::traits::{Embedder, Generator, VectorIndex};
use blendrag_embed::get_default_embedder;
use blendrag_llm::OllamaGenerator;
use blendrag_text::{LexicalStore, SparseRetriever};
use blendrag_vector::{DenseRetriever, LanceVectorIndex};

use crate::answer::AnswerService;
use crate::blended::BlendedRetriever;
use crate::ingest::Ingestor;
use crate::iterative::IterativeRetriever;
use crate::refine::QueryRefiner;

/// Every component wired from one `Settings`.
pub struct Engine {
    pub settings: Settings,
    pub ingestor: Ingestor,
    pub blended: Arc<BlendedRetriever>,
    pub iterative: Arc<IterativeRetriever>,
    pub answers: AnswerService,
}

impl Engine {
    /// On-disk lexical store, LanceDB vectors, the configured embedder and an
    /// Ollama generator.
    pub async fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = get_default_embedder(&settings.embedding).context("loading embedder")?;
        let vector_dir = expand_path(&settings.storage.vector_dir);
        std::fs::create_dir_all(&vector_dir).with_context(|| format!("creating {}", vector_dir.display()))?;
        let vectors = LanceVectorIndex::open(&vector_dir.to_string_lossy(), &settings.storage.table_name, embedder.dim()).await?;
        let lexical = LexicalStore::on_disk(expand_path(&settings.storage.lexical_dir), settings.storage.cache_capacity);
        let generator = OllamaGenerator::from_config(&settings.llm)?;
        info!(vector_dir = %vector_dir.display(), lexical_dir = %settings.storage.lexical_dir, model = generator.model(), "engine opened");
        Ok(Self::assemble(settings, embedder, Arc::new(vectors), Arc::new(lexical), Arc::new(generator)))
    }

    /// Wires caller-supplied collaborators; the generator serves both
    /// refinement and answering.
    pub fn assemble(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorIndex>,
        lexical: Arc<LexicalStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let dense = DenseRetriever::new(embedder.clone(), vectors.clone());
        let sparse = SparseRetriever::new(lexical.clone()).with_keyword_bonus(settings.retrieval.keyword_bonus);
        let refiner = QueryRefiner::new(settings.refiner.clone()).with_generator(generator.clone());
        let blended = Arc::new(BlendedRetriever::new(Arc::new(dense), Arc::new(sparse), Arc::new(refiner)).with_config(&settings.retrieval));
        let iterative = Arc::new(IterativeRetriever::new(blended.clone()).with_config(&settings.retrieval));
        let answers = AnswerService::new(iterative.clone(), generator).with_config(settings.answer.clone());
        let ingestor = Ingestor::new(embedder, vectors, lexical);
        Self { settings, ingestor, blended, iterative, answers }
    }
}
