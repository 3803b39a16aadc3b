//! Two-stage question pipeline: retrieve, then generate
//!
//! Every question gets a fresh [`PipelineState`]. Stages run strictly in
//! order and each returns a partial update that is merged before the next
//! stage starts. Nothing is carried over between questions.

mod indexer;

pub use indexer::{IndexReport, Indexer};

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::generation::AnswerComposer;
use crate::index::VectorIndexClient;
use crate::providers::{EmbeddingProvider, IndexHandle, LlmProvider};
use crate::retrieval::Retriever;
use crate::types::{PipelineState, StateUpdate};

/// A pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieve,
    Generate,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Retrieve => "retrieve",
            Stage::Generate => "generate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Question answering over a built index
#[derive(Clone)]
pub struct Pipeline {
    retriever: Arc<Retriever>,
    composer: Arc<AnswerComposer>,
}

impl Pipeline {
    /// Fixed stage order; no branches, no loops
    pub const STAGES: [Stage; 2] = [Stage::Retrieve, Stage::Generate];

    pub fn new(retriever: Retriever, composer: AnswerComposer) -> Self {
        Self {
            retriever: Arc::new(retriever),
            composer: Arc::new(composer),
        }
    }

    /// Wire a pipeline onto the index a build produced
    pub fn for_index(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        index: Arc<VectorIndexClient>,
        handle: IndexHandle,
        top_k: usize,
    ) -> Self {
        Self::new(
            Retriever::new(embedder, index, handle, top_k),
            AnswerComposer::new(llm),
        )
    }

    /// Answer one question, forwarding answer fragments as they arrive
    ///
    /// The first stage error is returned as-is; the state is dropped.
    pub async fn run(
        &self,
        question: &str,
        on_fragment: &mut (dyn FnMut(&str) + Send),
    ) -> Result<PipelineState> {
        let mut state = PipelineState::new(question);

        for stage in Self::STAGES {
            let start = Instant::now();
            tracing::debug!(stage = %stage, "Stage started");

            let update = self.run_stage(stage, &state, on_fragment).await?;
            state.apply(update);

            tracing::debug!(
                stage = %stage,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Stage finished"
            );
        }

        Ok(state)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        state: &PipelineState,
        on_fragment: &mut (dyn FnMut(&str) + Send),
    ) -> Result<StateUpdate> {
        match stage {
            Stage::Retrieve => self.retriever.retrieve(state).await,
            Stage::Generate => self.composer.generate(state, on_fragment).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Pipeline::STAGES, [Stage::Retrieve, Stage::Generate]);
        assert_eq!(Stage::Generate.to_string(), "generate");
    }
}
