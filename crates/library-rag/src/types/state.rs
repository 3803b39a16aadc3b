//! Per-query pipeline state

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// State carried through the stages for one question
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineState {
    /// The user's question
    pub question: String,
    /// Retrieved chunks, nearest first
    pub context: Vec<Chunk>,
    /// Accumulated answer text
    pub answer: String,
}

impl PipelineState {
    /// Fresh state for a question: empty context, empty answer
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: Vec::new(),
            answer: String::new(),
        }
    }

    /// Merge a stage's partial update; fields the stage left as `None` are kept
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(context) = update.context {
            self.context = context;
        }
        if let Some(answer) = update.answer {
            self.answer = answer;
        }
    }
}

/// Partial update returned by a stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub context: Option<Vec<Chunk>>,
    pub answer: Option<String>,
}

impl StateUpdate {
    pub fn context(context: Vec<Chunk>) -> Self {
        Self {
            context: Some(context),
            answer: None,
        }
    }

    pub fn answer(answer: String) -> Self {
        Self {
            context: None,
            answer: Some(answer),
        }
    }
}
