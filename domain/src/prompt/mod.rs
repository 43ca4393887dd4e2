//! Prompt domain
//!
//! Templates for generating prompts at each stage of the Ultra pipeline.

mod template;

pub use template::PromptTemplate;
