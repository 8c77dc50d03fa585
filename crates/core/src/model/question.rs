use serde::{Deserialize, Serialize};

/// One auto-generated question, as delivered by the analysis backend.
///
/// An empty `options` list means the question takes a free-text answer;
/// a non-empty list means exactly one of the listed options must be chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl Question {
    /// Returns true when the question requires picking one of its options.
    #[must_use]
    pub fn is_closed_choice(&self) -> bool {
        !self.options.is_empty()
    }

    /// Returns true when `answer` is acceptable for this question.
    ///
    /// Free-text questions accept any non-blank answer; closed-choice
    /// questions accept only one of the listed options.
    #[must_use]
    pub fn accepts(&self, answer: &str) -> bool {
        if self.is_closed_choice() {
            self.options.iter().any(|option| option == answer)
        } else {
            !answer.trim().is_empty()
        }
    }
}

/// A user-supplied answer, keyed by the question's position in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub question_index: usize,
    pub answer: String,
}
