//! Prompt templates with `{name}` placeholders

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Default retrieval QA prompt
pub const QA_TEMPLATE: &str = r#"Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:"#;

/// Rewrites a follow-up into a question that stands on its own
pub const CONDENSE_QUESTION_TEMPLATE: &str = r#"Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:"#;

/// System message of the translation chain
pub const TRANSLATION_SYSTEM_TEMPLATE: &str =
    "You are an assistant that translates from {input_language} to {output_language}.";

/// Human message of the translation chain
pub const TRANSLATION_HUMAN_TEMPLATE: &str = "{text}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex")
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Variable(String),
}

/// Parsed prompt template
///
/// `{{` and `}}` render as literal braces. Any other brace is kept as is.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn new(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            text.push_str(&template[last..whole.start()]);
            last = whole.end();

            match caps.get(1) {
                Some(name) => {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Variable(name.as_str().to_string()));
                }
                None => text.push_str(&whole.as_str()[..1]),
            }
        }
        text.push_str(&template[last..]);
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Self { segments }
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder; a missing variable is an error
    pub fn render(&self, variables: &BTreeMap<String, String>) -> Result<String> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Variable(name) => {
                    let value = variables
                        .get(name)
                        .ok_or_else(|| Error::Prompt(format!("missing variable '{}'", name)))?;
                    output.push_str(value);
                }
            }
        }
        Ok(output)
    }

    /// Render from borrowed pairs
    pub fn render_with(&self, pairs: &[(&str, &str)]) -> Result<String> {
        let variables = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.render(&variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let template = PromptTemplate::new("Question: {question}\nContext: {context}");
        assert_eq!(template.variables(), vec!["question", "context"]);
        let out = template
            .render_with(&[("question", "Who is Axel?"), ("context", "Axel is a cat.")])
            .unwrap();
        assert_eq!(out, "Question: Who is Axel?\nContext: Axel is a cat.");
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let template = PromptTemplate::new("{input} and {history}");
        let err = template.render_with(&[("input", "x")]).unwrap_err();
        assert!(matches!(err, Error::Prompt(ref m) if m.contains("history")));
    }

    #[test]
    fn test_escaped_braces_and_repeats() {
        let template = PromptTemplate::new(r#"{{"answer": "{a}"}} {a} {not valid}"#);
        assert_eq!(template.variables(), vec!["a"]);
        assert_eq!(
            template.render_with(&[("a", "1")]).unwrap(),
            r#"{"answer": "1"} 1 {not valid}"#
        );
    }

    #[test]
    fn test_values_are_not_reinterpreted() {
        let template = PromptTemplate::new("{text}");
        assert_eq!(template.render_with(&[("text", "{other}")]).unwrap(), "{other}");
    }

    #[test]
    fn test_builtin_templates_variables() {
        assert_eq!(PromptTemplate::new(QA_TEMPLATE).variables(), vec!["context", "question"]);
        assert_eq!(
            PromptTemplate::new(CONDENSE_QUESTION_TEMPLATE).variables(),
            vec!["chat_history", "question"]
        );
        assert_eq!(
            PromptTemplate::new(TRANSLATION_SYSTEM_TEMPLATE).variables(),
            vec!["input_language", "output_language"]
        );
    }
}
