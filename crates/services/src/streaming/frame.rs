//! Wire format of one streaming-channel frame.

use serde::Deserialize;

use sitequiz_core::model::Question;

use crate::error::StreamError;

/// One frame from the per-session push channel.
///
/// Every field is optional and independent: absence means "no information
/// this tick", not "empty". A single frame may carry a question batch
/// together with a terminal field.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamFrame {
    /// Question batch, double-encoded: a JSON string whose content is
    /// itself a JSON array of questions. See [`decode_questions`].
    pub questions: Option<String>,
    /// Only `"complete"` is recognized; other values are ignored.
    pub status: Option<String>,
    pub error: Option<String>,
}

impl StreamFrame {
    /// Parse a raw frame payload.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Decode` for structurally invalid payloads;
    /// the controller treats this as fatal to the session.
    pub fn parse(payload: &str) -> Result<Self, StreamError> {
        Ok(serde_json::from_str(payload)?)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("complete")
    }
}

/// Decode the double-encoded `questions` payload.
///
/// The backend serializes the question array to a string before embedding
/// it in the frame object. Kept for wire compatibility; this function is
/// the single change point if the protocol ever moves to single-level
/// encoding.
///
/// # Errors
///
/// Returns `StreamError::Decode` when the inner payload is not a question
/// array.
pub fn decode_questions(raw: &str) -> Result<Vec<Question>, StreamError> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_fields_are_independent() {
        let frame = StreamFrame::parse(r#"{"status":"complete"}"#).unwrap();
        assert!(frame.questions.is_none());
        assert!(frame.is_complete());
        assert!(frame.error.is_none());

        let frame = StreamFrame::parse("{}").unwrap();
        assert!(frame.questions.is_none());
        assert!(!frame.is_complete());
    }

    #[test]
    fn unrecognized_status_is_not_terminal() {
        let frame = StreamFrame::parse(r#"{"status":"working"}"#).unwrap();
        assert!(!frame.is_complete());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let frame = StreamFrame::parse(r#"{"link":"https://example.com/a"}"#).unwrap();
        assert!(frame.questions.is_none());
    }

    #[test]
    fn questions_payload_is_double_encoded() {
        let payload = r#"{"questions":"[{\"question\":\"Q1\",\"options\":[]}]"}"#;
        let frame = StreamFrame::parse(payload).unwrap();
        let questions = decode_questions(frame.questions.as_deref().unwrap()).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Q1");
        assert!(questions[0].options.is_empty());
    }

    #[test]
    fn malformed_inner_payload_is_a_decode_error() {
        assert!(matches!(
            decode_questions("not json"),
            Err(StreamError::Decode(_))
        ));
    }

    #[test]
    fn malformed_frame_is_a_decode_error() {
        assert!(matches!(
            StreamFrame::parse("data nonsense"),
            Err(StreamError::Decode(_))
        ));
    }
}
