//! Domain types shared by the retrieval, generation and runner crates.

use serde::{Deserialize, Serialize};

/// Position of a passage inside a document collection.
pub type DocIndex = usize;

/// A dense vector produced by a query encoder. Never mutated once produced.
pub type Embedding = Vec<f32>;

/// A retrievable unit of the document collection.
///
/// - `id`: collection-specific identifier (e.g. a DPR wiki id)
/// - `title`/`text`: the payload rendered into prompts and re-encoded for rerank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl Passage {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), text: text.into() }
    }

    /// Stand-in used when retrieval is disabled.
    pub fn not_found() -> Self {
        Self::new("", "Not Found", "No corresponding source was found.")
    }

    /// Text fed to the encoder when passages are re-embedded.
    pub fn encoder_text(&self) -> String {
        format!("{} {}", self.title, self.text)
    }
}

/// Four-way multiple-choice metadata attached to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoice {
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
}

/// One question to answer. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<MultipleChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Sample {
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self { id: id.into(), question: question.into(), choices: None, answer: None }
    }

    pub fn multiple_choice(id: impl Into<String>, question: impl Into<String>, choices: MultipleChoice, answer: Option<String>) -> Self {
        Self { id: id.into(), question: question.into(), choices: Some(choices), answer }
    }

    /// Text sent to the retriever and shown to the generator.
    ///
    /// Multiple-choice samples are wrapped in a letter-answer instruction.
    pub fn query_text(&self) -> String {
        match &self.choices {
            None => self.question.clone(),
            Some(c) => format!(
                "Answer the following question: {} The possible answers are : A) {}; B) {}; C) {}; D) {}. No further questions allowed. Please answer only using one of the letters A, B, C, or D. Your answer:",
                self.question, c.a, c.b, c.c, c.d
            ),
        }
    }
}

/// Probability assigned to one candidate next token (or answer option).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenProbability {
    pub token: String,
    pub probability: f32,
}

/// Which retrieval path produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Hosted,
    CachedResults,
    Local,
}
