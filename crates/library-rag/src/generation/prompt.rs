//! Prompt template for grounded question answering

use crate::providers::ChatMessage;
use crate::types::Chunk;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Fixed instructions sent ahead of every question
    pub const INSTRUCTIONS: &'static str = r#"You are an assistant for question-answering tasks. Use the following pieces of retrieved context to answer the question.
If you don't know the answer, just say that you don't know.
Use three sentences maximum and keep the answer concise."#;

    /// Join chunk texts, one blank line between each
    pub fn build_context(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render the question and its context into the user turn
    pub fn build_qa_prompt(question: &str, context: &str) -> String {
        format!(
            r#"Question: {question}
Context: {context}
Answer:"#,
            question = question,
            context = context
        )
    }

    /// Messages for one answer: instructions, then question with context
    pub fn build_messages(question: &str, chunks: &[Chunk]) -> Vec<ChatMessage> {
        let context = Self::build_context(chunks);
        vec![
            ChatMessage::system(Self::INSTRUCTIONS),
            ChatMessage::user(Self::build_qa_prompt(question, &context)),
        ]
    }
}
