//! Prompt templates for the Ultra pipeline

use crate::request::pattern::AnalysisPattern;

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// Heading the peer review prompt asks models to put their revision under
    pub const REVISION_HEADING: &'static str = "## Revised Answer";

    /// System prompt for the initial generation stage
    pub fn initial_system() -> &'static str {
        r#"You are a knowledgeable expert answering a question independently.
Other experts are answering the same question in parallel; you will not see their answers yet.
Be concise but comprehensive. Support your points with reasoning and examples where appropriate.
Focus on accuracy and clarity, and say so plainly when you are unsure."#
    }

    /// User prompt for initial generation
    pub fn initial_query(prompt: &str) -> String {
        format!(
            r#"Please answer the following:

{}

Provide a clear, well-structured response."#,
            prompt
        )
    }

    /// System prompt for the peer review stage
    pub fn peer_review_system() -> &'static str {
        r#"You are an expert revising your own answer after reading answers from other experts.
Assess the other answers objectively: adopt what they got right, reject what they got wrong.
Do not defer to the majority without reasons. Your output replaces your original answer."#
    }

    /// Label answers anonymously as "Response A", "Response B", ...
    pub fn anonymize(answers: &[String]) -> Vec<(String, String)> {
        answers
            .iter()
            .enumerate()
            .map(|(i, text)| (Self::response_label(i), text.clone()))
            .collect()
    }

    fn response_label(index: usize) -> String {
        let letter = (b'A' + (index % 26) as u8) as char;
        if index < 26 {
            format!("Response {}", letter)
        } else {
            format!("Response {}{}", letter, index / 26)
        }
    }

    /// User prompt asking one model to critique the others and revise its own answer
    pub fn peer_review_prompt(
        prompt: &str,
        own_answer: &str,
        others: &[(String, String)],
    ) -> String {
        let mut out = format!(
            r#"Original question: {}

Your initial answer:
--- Your answer ---
{}

Answers from other experts:
"#,
            prompt, own_answer
        );

        for (label, content) in others {
            out.push_str(&format!("\n--- {} ---\n{}\n", label, content));
        }

        out.push_str(&format!(
            "
First, briefly critique each of the other answers (accuracy, completeness, clarity).
Then write your revised answer under the header \"{}\".
The revised answer must stand on its own without referring to the other responses.",
            Self::REVISION_HEADING
        ));

        out
    }

    /// System prompt for the synthesis stage
    pub fn synthesis_system(pattern: AnalysisPattern) -> String {
        format!(
            r#"You are the synthesizer combining several expert answers into one final answer.
{}
Be balanced and objective. Give weight to well-reasoned arguments regardless of source.
Answer the original question directly; do not describe the process that produced the answers."#,
            Self::pattern_instructions(pattern)
        )
    }

    /// Pattern-specific synthesis guidance
    pub fn pattern_instructions(pattern: AnalysisPattern) -> &'static str {
        match pattern {
            AnalysisPattern::Gut => {
                "Pattern: gut. Give the answer the experts collectively lean towards, in a few sentences. Skip hedging unless the answers truly conflict."
            }
            AnalysisPattern::Confidence => {
                "Pattern: confidence. Weigh each claim by how many answers support it and how well. Mark claims as high, medium or low confidence and lead with the high-confidence core."
            }
            AnalysisPattern::Critique => {
                "Pattern: critique. Identify errors, gaps and weak reasoning across the answers first, then give a corrected answer that avoids them."
            }
            AnalysisPattern::FactCheck => {
                "Pattern: fact_check. Check each factual claim against the others. Keep claims that are consistent and well supported, flag disputed ones explicitly, and drop unsupported ones."
            }
            AnalysisPattern::Perspective => {
                "Pattern: perspective. Preserve genuinely different viewpoints instead of forcing a consensus. Present each viewpoint with its strongest support, then note where they agree."
            }
            AnalysisPattern::Scenario => {
                "Pattern: scenario. Lay out the plausible scenarios the answers imply, with the assumptions behind each and what would make each one more likely."
            }
        }
    }

    /// User prompt for synthesis
    ///
    /// `answers` pairs a source label with its text. When `revised` is set the
    /// answers are post-peer-review revisions.
    pub fn synthesis_prompt(
        prompt: &str,
        pattern: AnalysisPattern,
        answers: &[(String, String)],
        revised: bool,
    ) -> String {
        let heading = if revised {
            "Expert answers (revised after peer review)"
        } else {
            "Expert answers"
        };
        let mut out = format!("Original question: {}\n\n{}:\n", prompt, heading);

        for (source, content) in answers {
            out.push_str(&format!("\n--- {} ---\n{}\n", source, content));
        }

        out.push_str(&format!(
            "\n{}\n\nWrite the single consolidated answer now.",
            Self::pattern_instructions(pattern)
        ));

        out
    }
}
