use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("Could not read question bank {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Question bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Question bank is empty")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct QuestionFile {
    questions: Vec<String>,
}

/// Loads the `{"questions": [...]}` bank. Blank entries and duplicates are
/// dropped so the bank can be consumed without replacement.
#[tracing::instrument]
pub fn load_question_bank(path: &Path) -> Result<Vec<String>, QuestionBankError> {
    let raw = fs::read_to_string(path).map_err(|source| QuestionBankError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let bank = parse_question_bank(&raw)?;
    tracing::info!(count = bank.len(), "Question bank loaded");
    Ok(bank)
}

pub fn parse_question_bank(raw: &str) -> Result<Vec<String>, QuestionBankError> {
    let file: QuestionFile = serde_json::from_str(raw)?;

    let mut bank: Vec<String> = Vec::with_capacity(file.questions.len());
    for question in file.questions {
        let question = question.trim();
        if question.is_empty() || bank.iter().any(|q| q == question) {
            continue;
        }
        bank.push(question.to_string());
    }

    if bank.is_empty() {
        return Err(QuestionBankError::Empty);
    }
    Ok(bank)
}
