//! Answer chains composing retrieval, memory and a chat model

use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::memory::{Memory, MemoryVariables};
use crate::providers::{ChatMessage, LlmProvider};
use crate::retrieval::Retriever;
use crate::types::memory::render_turns;
use crate::types::{MemoryTurn, QueryResult, ScoredChunk};

use super::prompt::{
    PromptTemplate, CONDENSE_QUESTION_TEMPLATE, QA_TEMPLATE, TRANSLATION_HUMAN_TEMPLATE,
    TRANSLATION_SYSTEM_TEMPLATE,
};

/// Generated answer with the chunks it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    /// Question used for retrieval (after condensing, if any)
    pub question: String,
    pub sources: Vec<ScoredChunk>,
}

/// Retrieved chunk texts separated by blank lines, in rank order
pub fn stuff_context(result: &QueryResult) -> String {
    result.texts().join("\n\n")
}

/// Retrieve, stuff the chunks into one prompt, ask once
pub struct RetrievalQa {
    llm: Arc<dyn LlmProvider>,
    retriever: Retriever,
    prompt: PromptTemplate,
}

impl RetrievalQa {
    pub fn new(llm: Arc<dyn LlmProvider>, retriever: Retriever) -> Self {
        Self {
            llm,
            retriever,
            prompt: PromptTemplate::new(QA_TEMPLATE),
        }
    }

    /// Replace the QA prompt; it receives `{context}` and `{question}`
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub async fn ask(&self, question: &str) -> Result<QaAnswer> {
        let result = self.retriever.query(question).await?;
        let context = stuff_context(&result);
        let prompt = self
            .prompt
            .render_with(&[("context", context.as_str()), ("question", question)])?;

        tracing::info!(
            "Answering with {} retrieved chunks using {}",
            result.len(),
            self.llm.model()
        );
        let answer = self.llm.complete(&prompt).await?;

        Ok(QaAnswer {
            answer,
            question: question.to_string(),
            sources: result.matches,
        })
    }
}

/// Retrieval QA over a conversation: follow-ups are condensed into standalone questions
pub struct ConversationalRetrievalQa {
    llm: Arc<dyn LlmProvider>,
    retriever: Retriever,
    qa_prompt: PromptTemplate,
    condense_prompt: PromptTemplate,
}

impl ConversationalRetrievalQa {
    pub fn new(llm: Arc<dyn LlmProvider>, retriever: Retriever) -> Self {
        Self {
            llm,
            retriever,
            qa_prompt: PromptTemplate::new(QA_TEMPLATE),
            condense_prompt: PromptTemplate::new(CONDENSE_QUESTION_TEMPLATE),
        }
    }

    /// Replace the QA prompt; it may use `{context}`, `{chat_history}` and `{question}`
    pub fn with_qa_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.qa_prompt = prompt;
        self
    }

    /// Answer `question` given the turns so far, which are used in order and unchanged
    pub async fn ask(&self, question: &str, history: &[MemoryTurn]) -> Result<QaAnswer> {
        let chat_history = render_turns(history);

        let standalone = if history.is_empty() {
            question.to_string()
        } else {
            let prompt = self
                .condense_prompt
                .render_with(&[("chat_history", chat_history.as_str()), ("question", question)])?;
            let condensed = self.llm.complete(&prompt).await?;
            tracing::debug!("Condensed follow-up question to: {}", condensed.trim());
            condensed.trim().to_string()
        };

        let result = self.retriever.query(&standalone).await?;
        let context = stuff_context(&result);
        let prompt = self.qa_prompt.render_with(&[
            ("context", context.as_str()),
            ("chat_history", chat_history.as_str()),
            ("question", standalone.as_str()),
        ])?;
        let answer = self.llm.complete(&prompt).await?;

        Ok(QaAnswer {
            answer,
            question: standalone,
            sources: result.matches,
        })
    }
}

/// Template plus optional memory; the exchange is saved back to memory
pub struct LlmChain {
    llm: Arc<dyn LlmProvider>,
    prompt: PromptTemplate,
    memory: Option<Arc<dyn Memory>>,
    input_key: String,
}

impl LlmChain {
    pub fn new(llm: Arc<dyn LlmProvider>, prompt: PromptTemplate) -> Self {
        Self {
            llm,
            prompt,
            memory: None,
            input_key: "input".to_string(),
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Run with memory variables plus `input`
    pub async fn call(&self, input: &str) -> Result<String> {
        let mut variables = match &self.memory {
            Some(memory) => memory.load(input).await?,
            None => MemoryVariables::new(),
        };
        variables.insert(self.input_key.clone(), input.to_string());

        let prompt = self.prompt.render(&variables)?;
        let answer = self.llm.complete(&prompt).await?;

        if let Some(memory) = &self.memory {
            memory.save_context(input, &answer).await?;
        }
        Ok(answer)
    }
}

/// System instruction naming both languages, then the text as the human message
pub struct TranslationChain {
    llm: Arc<dyn LlmProvider>,
    system: PromptTemplate,
    human: PromptTemplate,
}

impl TranslationChain {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            system: PromptTemplate::new(TRANSLATION_SYSTEM_TEMPLATE),
            human: PromptTemplate::new(TRANSLATION_HUMAN_TEMPLATE),
        }
    }

    pub async fn translate(&self, input_language: &str, output_language: &str, text: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(self.system.render_with(&[
                ("input_language", input_language),
                ("output_language", output_language),
            ])?),
            ChatMessage::user(self.human.render_with(&[("text", text)])?),
        ];
        self.llm.chat(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::RecordingLlm;
    use crate::memory::BufferMemory;
    use crate::providers::hashing::HashingEmbedder;
    use crate::providers::local::{InMemoryChatHistory, InMemoryVectorStore};
    use crate::providers::ChatHistoryProvider;
    use crate::types::{Chunk, Role};

    async fn indexed_retriever(texts: &[&str], k: usize) -> Retriever {
        let retriever = Retriever::new(
            Arc::new(HashingEmbedder::new(256).unwrap()),
            Arc::new(InMemoryVectorStore::new()),
            k,
        );
        retriever
            .index(texts.iter().map(|t| Chunk::new(*t)).collect())
            .await
            .unwrap();
        retriever
    }

    #[tokio::test]
    async fn test_retrieval_qa_stuffs_context() {
        let llm = Arc::new(RecordingLlm::new(&["Axel is a cat."]));
        let retriever = indexed_retriever(&["Axel is a grey cat.", "Lima is a city."], 1).await;

        let answer = RetrievalQa::new(llm.clone(), retriever)
            .ask("Who is Axel?")
            .await
            .unwrap();

        assert_eq!(answer.answer, "Axel is a cat.");
        assert_eq!(answer.sources.len(), 1);
        let prompt = &llm.requests()[0][0].content;
        assert!(prompt.contains("Axel is a grey cat."));
        assert!(!prompt.contains("Lima"));
        assert!(prompt.ends_with("Question: Who is Axel?\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn test_conversational_qa_condenses_then_answers() {
        let llm = Arc::new(RecordingLlm::new(&["Who is Jaskier?", "A bard."]));
        let retriever = indexed_retriever(&["Jaskier is a bard.", "Geralt is a witcher."], 1).await;
        let chain = ConversationalRetrievalQa::new(llm.clone(), retriever).with_qa_prompt(PromptTemplate::new(
            "Context:\n{context}\n\nHistory:\n{chat_history}\n\nQuestion: {question}\nAnswer:",
        ));

        let history = vec![
            MemoryTurn::user("Hi, my name is Carlos"),
            MemoryTurn::assistant("Hello Carlos"),
        ];
        let answer = chain.ask("and who is he?", &history).await.unwrap();

        assert_eq!(answer.answer, "A bard.");
        assert_eq!(answer.question, "Who is Jaskier?");

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0][0].content.contains("Human: Hi, my name is Carlos\nAI: Hello Carlos"));
        assert!(requests[0][0].content.contains("Follow Up Input: and who is he?"));
        let qa_prompt = &requests[1][0].content;
        assert!(qa_prompt.contains("Jaskier is a bard."));
        assert!(qa_prompt.contains("History:\nHuman: Hi, my name is Carlos\nAI: Hello Carlos"));
    }

    #[tokio::test]
    async fn test_conversational_qa_without_history_skips_condense() {
        let llm = Arc::new(RecordingLlm::new(&["A witcher."]));
        let retriever = indexed_retriever(&["Geralt is a witcher."], 1).await;
        let chain = ConversationalRetrievalQa::new(llm.clone(), retriever);

        chain.ask("Who is Geralt?", &[]).await.unwrap();
        assert_eq!(llm.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_llm_chain_keeps_turn_order_and_saves_exchange() {
        let llm = Arc::new(RecordingLlm::new(&["Your name is Carlos."]));
        let history = Arc::new(InMemoryChatHistory::new());
        let memory = Arc::new(BufferMemory::new("history_current", history.clone(), "s"));
        memory
            .seed(&[
                MemoryTurn::user("first"),
                MemoryTurn::assistant("second"),
                MemoryTurn::user("third"),
                MemoryTurn::assistant("fourth"),
            ])
            .await
            .unwrap();

        let chain = LlmChain::new(
            llm.clone(),
            PromptTemplate::new("{history_current}\nUser: {input}\nAI:"),
        )
        .with_memory(memory);
        let answer = chain.call("What is my name?").await.unwrap();
        assert_eq!(answer, "Your name is Carlos.");

        assert_eq!(
            llm.requests()[0][0].content,
            "Human: first\nAI: second\nHuman: third\nAI: fourth\nUser: What is my name?\nAI:"
        );
        let turns = history.turns("s").await.unwrap();
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[4], MemoryTurn::user("What is my name?"));
        assert_eq!(turns[5], MemoryTurn::assistant("Your name is Carlos."));
    }

    #[tokio::test]
    async fn test_llm_chain_missing_variable_does_not_call_model() {
        let llm = Arc::new(RecordingLlm::new(&["unused"]));
        let chain = LlmChain::new(llm.clone(), PromptTemplate::new("{history} {input}"));
        assert!(chain.call("hi").await.is_err());
        assert!(llm.requests().is_empty());
    }

    #[tokio::test]
    async fn test_translation_messages() {
        let llm = Arc::new(RecordingLlm::new(&["Amo programmare"]));
        let out = TranslationChain::new(llm.clone())
            .translate("Spanish", "Italian", "Me encanta programar")
            .await
            .unwrap();
        assert_eq!(out, "Amo programmare");

        let messages = &llm.requests()[0];
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            messages[0].content,
            "You are an assistant that translates from Spanish to Italian."
        );
        assert_eq!(messages[1], ChatMessage::user("Me encanta programar"));
    }
}
