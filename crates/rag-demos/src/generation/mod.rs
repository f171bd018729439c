//! Answer generation: prompt templates and chains

mod chains;
pub mod prompt;

pub use chains::{
    stuff_context, ConversationalRetrievalQa, LlmChain, QaAnswer, RetrievalQa, TranslationChain,
};
pub use prompt::PromptTemplate;

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    use crate::error::{Error, Result};
    use crate::providers::{ChatMessage, LlmProvider};

    /// Replays canned answers and records every request
    pub(crate) struct RecordingLlm {
        replies: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingLlm {
        pub(crate) fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requests(&self) -> Vec<Vec<ChatMessage>> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for RecordingLlm {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
            self.requests.lock().push(messages.to_vec());
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| Error::llm("no canned reply left"))
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "recording-model"
        }
    }
}
