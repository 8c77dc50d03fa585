use crate::model::{Question, UserAnswer};

/// Mutable state for one URL-analysis session.
///
/// Holds everything a view needs to render the current submission: the URL
/// under analysis, the backend-issued session id, discovered links, the
/// accumulated question list, the user's answers, and the generation
/// lifecycle flags. All transitions are total, synchronous reducers; no
/// operation here performs I/O or scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    current_url: String,
    session_id: Option<String>,
    links: Vec<String>,
    questions: Vec<Question>,
    user_answers: Vec<UserAnswer>,
    is_generating: bool,
    error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new submission for `url`.
    ///
    /// Clears questions, answers, links, and any previous error in the same
    /// transition, so stale data from a prior session can never be observed
    /// alongside the new URL. Must run before any network effect.
    pub fn start_session(&mut self, url: impl Into<String>) {
        self.current_url = url.into();
        self.questions.clear();
        self.user_answers.clear();
        self.links.clear();
        self.error = None;
    }

    /// Record the backend-issued session id after a successful submission.
    pub fn set_session_id(&mut self, id: impl Into<String>) {
        self.session_id = Some(id.into());
    }

    /// Record the link set returned by the submission response.
    pub fn set_links(&mut self, links: Vec<String>) {
        self.links = links;
    }

    /// Append a batch of questions in arrival order.
    ///
    /// The question list is append-only for the lifetime of a session;
    /// duplicates are kept as delivered.
    pub fn append_questions(&mut self, batch: Vec<Question>) {
        self.questions.extend(batch);
    }

    /// Insert or replace the answer for the question at `question_index`.
    pub fn upsert_answer(&mut self, question_index: usize, answer: impl Into<String>) {
        let answer = answer.into();
        match self
            .user_answers
            .iter_mut()
            .find(|existing| existing.question_index == question_index)
        {
            Some(existing) => existing.answer = answer,
            None => self.user_answers.push(UserAnswer {
                question_index,
                answer,
            }),
        }
    }

    pub fn set_generating(&mut self, generating: bool) {
        self.is_generating = generating;
    }

    /// Raw error setter, kept for callers that manage the generating flag
    /// themselves. Prefer [`Session::fail`] for terminal failures.
    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    /// Terminal failure transition: records the error and clears the
    /// generating flag in one step, so no intermediate state exists where
    /// an error is set while generation still appears active.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.is_generating = false;
    }

    #[must_use]
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn links(&self) -> &[String] {
        &self.links
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn user_answers(&self) -> &[UserAnswer] {
        &self.user_answers
    }

    /// Answer recorded for the question at `question_index`, if any.
    #[must_use]
    pub fn answer_for(&self, question_index: usize) -> Option<&str> {
        self.user_answers
            .iter()
            .find(|a| a.question_index == question_index)
            .map(|a| a.answer.as_str())
    }

    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
