//! Answer generation: prompt rendering, streaming composition, Ollama client

mod composer;
pub mod ollama;
mod prompt;
#[cfg(test)]
pub(crate) mod test_server;

pub use composer::AnswerComposer;
pub use ollama::OllamaClient;
pub use prompt::PromptBuilder;
