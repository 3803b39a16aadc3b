//! Answer composition: one streamed completion per question

use futures_util::StreamExt;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::LlmProvider;
use crate::types::{PipelineState, StateUpdate};

use super::prompt::PromptBuilder;

/// Produces the answer for a state whose context has been retrieved
pub struct AnswerComposer {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerComposer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Stream an answer, handing every fragment to `on_fragment` as it arrives
    ///
    /// The completion service is called exactly once, even when the context is
    /// empty. A failure mid-stream is returned after the fragments already
    /// forwarded; no update is produced in that case.
    pub async fn generate(
        &self,
        state: &PipelineState,
        on_fragment: &mut (dyn FnMut(&str) + Send),
    ) -> Result<StateUpdate> {
        let messages = PromptBuilder::build_messages(&state.question, &state.context);

        tracing::debug!(
            provider = self.llm.name(),
            model = self.llm.model(),
            context_chunks = state.context.len(),
            "Starting answer stream"
        );

        let mut stream = self.llm.complete_stream(&messages).await?;
        let mut answer = String::new();

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            on_fragment(&fragment);
            answer.push_str(&fragment);
        }

        tracing::debug!(answer_chars = answer.chars().count(), "Answer stream finished");
        Ok(StateUpdate::answer(answer))
    }
}
