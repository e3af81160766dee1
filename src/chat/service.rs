//! Answering questions about the indexed documents

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, RagConfig, RetrievalConfig, Topic};
use crate::document::ScoredChunk;
use crate::llm::{build_prompt, CompletionRequest, LlmProvider};
use crate::query::{Embedder, Retriever};
use crate::safety::{SafetyLimits, SafetyManager};
use crate::storage::{lock_index, SharedIndex};
use crate::Result;

/// Questions about the assistant itself, answered without the model
const SYSTEM_QUESTIONS: &[&str] = &[
    "how many documents",
    "what documents",
    "what can you",
    "what topics",
];

pub const NO_RELEVANT_ANSWER: &str =
    "I couldn't find relevant information in my documents to answer that question.";

/// Answer to a single question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
    /// Object keys of the chunks the answer was grounded on
    pub sources: Vec<String>,
    pub relevance_scores: Vec<f32>,
    /// True when the answer came from the assistant rather than the model
    pub is_system_response: bool,
    /// Approximate dollar cost of a model answer
    pub estimated_cost: Option<f64>,
}

impl ChatResponse {
    fn system(answer: String, sources: Vec<String>) -> Self {
        Self {
            answer,
            sources,
            relevance_scores: Vec::new(),
            is_system_response: true,
            estimated_cost: None,
        }
    }
}

/// What the assistant knows about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    pub count: usize,
    pub sources: Vec<String>,
    pub total_chunks: usize,
    pub topics: Vec<Topic>,
}

pub struct ChatService {
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LlmProvider>,
    safety: SafetyManager,
    retrieval: RetrievalConfig,
    llm_config: LlmConfig,
    topics: Vec<Topic>,
}

impl ChatService {
    pub fn new(
        index: SharedIndex,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LlmProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            safety: SafetyManager::new(&config.safety),
            retrieval: config.retrieval.clone(),
            llm_config: config.llm.clone(),
            topics: config.topics.clone(),
        }
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn limits(&self) -> SafetyLimits {
        self.safety.limits()
    }

    pub async fn remaining_queries(&self, client: &str) -> usize {
        self.safety.remaining(client).await
    }

    /// Answer `question` on behalf of `client` (an IP address or other stable id)
    pub async fn respond(&self, client: &str, question: &str) -> Result<ChatResponse> {
        self.safety.check(client, question).await?;
        let question = question.trim();

        if is_system_question(question) {
            let info = self.document_info().await?;
            tracing::debug!("Answering system question: {}", question);
            return Ok(ChatResponse::system(describe(&info), info.sources));
        }

        let results = self.search(question, self.retrieval.top_k).await?;
        let best = results.first().map(|r| r.score).unwrap_or(f32::MIN);
        if results.is_empty() || best < self.retrieval.min_relevance {
            tracing::info!("No relevant context for question (best score {:.3})", best);
            return Ok(ChatResponse::system(self.no_relevant_answer(), Vec::new()));
        }

        let context: Vec<ScoredChunk> = results
            .into_iter()
            .take(self.retrieval.answer_chunks)
            .collect();
        let prompt = build_prompt(question, &context);
        let request = CompletionRequest::new(prompt, &self.llm_config);

        tracing::info!(
            "Asking {} with {} context chunks",
            self.llm.name(),
            context.len()
        );
        let answer = self.llm.complete(&request).await?;

        Ok(ChatResponse {
            answer: answer.trim().to_string(),
            sources: context.iter().map(|c| c.chunk.source.clone()).collect(),
            relevance_scores: context.iter().map(|c| c.score).collect(),
            is_system_response: false,
            estimated_cost: self.llm_config.cost_per_answer,
        })
    }

    /// Search on behalf of `client`, under the same guard rails as questions
    pub async fn search_for(&self, client: &str, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        self.safety.check(client, query).await?;
        self.search(query.trim(), limit).await
    }

    /// Retrieve the `limit` chunks most similar to `query`
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        let index = self.index.clone();
        let embedder = self.embedder.clone();
        let query = query.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<ScoredChunk>> {
            Retriever::new(&index, embedder.as_ref()).find_similar_chunks(&query, limit)
        })
        .await?
    }

    /// Summary of the indexed documents and advertised topics
    pub async fn document_info(&self) -> Result<DocumentInfo> {
        let index = self.index.clone();
        let topics = self.topics.clone();

        tokio::task::spawn_blocking(move || -> Result<DocumentInfo> {
            let index = lock_index(&index);
            let sources: Vec<String> = index
                .documents()?
                .into_iter()
                .filter(|d| d.chunks > 0)
                .map(|d| d.key)
                .collect();
            Ok(DocumentInfo {
                count: sources.len(),
                sources,
                total_chunks: index.count_chunks()?,
                topics,
            })
        })
        .await?
    }

    fn no_relevant_answer(&self) -> String {
        if self.topics.is_empty() {
            NO_RELEVANT_ANSWER.to_string()
        } else {
            format!("{} Please ask about {}.", NO_RELEVANT_ANSWER, topic_list(&self.topics))
        }
    }
}

fn is_system_question(question: &str) -> bool {
    let lowered = question.to_lowercase();
    SYSTEM_QUESTIONS.iter().any(|q| lowered.contains(q))
}

fn describe(info: &DocumentInfo) -> String {
    let noun = if info.count == 1 { "document" } else { "documents" };
    if info.topics.is_empty() {
        if info.sources.is_empty() {
            return "I don't have any documents indexed yet.".to_string();
        }
        return format!("I have access to {} {}: {}.", info.count, noun, info.sources.join(", "));
    }
    format!(
        "I have access to {} {} covering: {}. You can ask about {}.",
        info.count,
        noun,
        info.topics.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", "),
        topic_list(&info.topics)
    )
}

/// "a", "a or b", "a, b or c"
fn topic_list(topics: &[Topic]) -> String {
    let names: Vec<String> = topics.iter().map(|t| t.name.to_lowercase()).collect();
    match names.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}
