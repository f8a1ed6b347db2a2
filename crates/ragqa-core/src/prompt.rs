//! Prompt templates selectable by name from configuration.

use anyhow::{anyhow, Result};

use crate::traits::PromptTemplate;
use crate::types::{Passage, Sample};

/// Numbered passages followed by the question.
#[derive(Debug, Clone, Default)]
pub struct QaTemplate;

impl PromptTemplate for QaTemplate {
    fn render(&self, sample: &Sample, passages: &[Passage]) -> String {
        let mut prompt = String::from("Please answer the following question given the following passages:\n");
        for (i, p) in passages.iter().enumerate() {
            prompt.push_str(&format!("- title: {}\n{}\n", p.title, p.text));
            if i + 1 < passages.len() { prompt.push('\n'); }
        }
        prompt.push_str(&format!("Question: {}\nAnswer: ", sample.query_text()));
        prompt
    }
}

/// Question only; passages are ignored.
#[derive(Debug, Clone, Default)]
pub struct NoContextTemplate;

impl PromptTemplate for NoContextTemplate {
    fn render(&self, sample: &Sample, _passages: &[Passage]) -> String {
        format!("Question: {}\nAnswer: ", sample.query_text())
    }
}

pub fn load_template(name: &str) -> Result<Box<dyn PromptTemplate>> {
    match name {
        "qa" => Ok(Box::new(QaTemplate)),
        "no_context" | "no-context" => Ok(Box::new(NoContextTemplate)),
        other => Err(anyhow!("Unknown prompt template '{}'", other)),
    }
}
