use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::chat::{ChatResponse, DocumentInfo, Session};
use crate::document::{preview, DocumentKind};
use crate::ingest::{DocumentChunker, IndexReport, Indexer};
use crate::safety::SafetyLimits;
use crate::server::AppState;
use crate::storage::lock_index;
use crate::Error;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error rendered as `{ "error": ... }` with a matching status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::Rejected(_) | Error::InvalidUri(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Client identity for rate limiting: the peer address, or the first
/// `X-Forwarded-For` hop when the server sits behind a trusted proxy
fn client_id(state: &AppState, headers: &HeaderMap, peer: SocketAddr) -> String {
    if !state.config.server.trust_forwarded_for {
        return peer.ip().to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

pub async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub documents: DocumentInfo,
    pub limits: SafetyLimits,
    pub remaining_queries: usize,
    pub provider: String,
    pub model: String,
    pub example_questions: Vec<String>,
}

pub async fn info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> ApiResult<InfoResponse> {
    let client = client_id(&state, &headers, peer);
    let llm = &state.config.llm;

    Ok(Json(InfoResponse {
        documents: state.chat.document_info().await?,
        limits: state.chat.limits(),
        remaining_queries: state.chat.remaining_queries(&client).await,
        provider: format!("{:?}", llm.provider).to_lowercase(),
        model: llm.model_name().to_string(),
        example_questions: state.config.example_questions.clone(),
    }))
}

#[derive(Serialize)]
pub struct DocumentEntry {
    pub key: String,
    pub size: u64,
    pub kind: Option<DocumentKind>,
    pub indexed: bool,
    pub chunks: usize,
}

pub async fn documents(State(state): State<Arc<AppState>>) -> ApiResult<Vec<DocumentEntry>> {
    let objects = state.store.list(&state.config.storage.prefix).await?;

    let index = state.chat.index().clone();
    let indexed = tokio::task::spawn_blocking(move || -> crate::Result<HashMap<String, usize>> {
        Ok(lock_index(&index)
            .documents()?
            .into_iter()
            .map(|d| (d.key, d.chunks))
            .collect())
    })
    .await
    .map_err(Error::from)??;

    Ok(Json(
        objects
            .into_iter()
            .map(|o| DocumentEntry {
                kind: DocumentKind::from_key(&o.key),
                indexed: indexed.contains_key(&o.key),
                chunks: indexed.get(&o.key).copied().unwrap_or(0),
                key: o.key,
                size: o.size,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub uri: String,
    pub source: String,
    pub chunk_index: usize,
    pub score: f32,
    pub preview: String,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<SearchHit>> {
    if params.query.trim().is_empty() {
        return Err(Error::Rejected("query must not be empty".to_string()).into());
    }
    let client = client_id(&state, &headers, peer);
    let limit = params.limit.unwrap_or(state.config.retrieval.top_k).clamp(1, 50);

    let results = state.chat.search_for(&client, &params.query, limit).await?;
    Ok(Json(
        results
            .into_iter()
            .map(|r| SearchHit {
                uri: r.chunk.uri.to_uri_string(),
                preview: preview(&r.chunk.text, 200),
                source: r.chunk.source,
                chunk_index: r.chunk.chunk_index,
                score: r.score,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub response: ChatResponse,
    pub query_count: usize,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatReply> {
    let client = client_id(&state, &headers, peer);

    let response = state.chat.respond(&client, &request.message).await?;
    let (session_id, query_count) = state
        .sessions
        .record_exchange(request.session_id, request.message.trim(), &response)
        .await;

    Ok(Json(ChatReply { session_id, response, query_count }))
}

pub async fn session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Session> {
    state
        .sessions
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("session {}", id)).into())
}

pub async fn reindex(State(state): State<Arc<AppState>>) -> ApiResult<IndexReport> {
    let _guard = state.reindexing.lock().await;
    let chunking = &state.config.chunking;

    let indexer = Indexer::new(
        state.chat.index().clone(),
        state.chat.embedder(),
        DocumentChunker::with_settings(chunking.chunk_size, chunking.overlap),
    )
    .with_prefix(state.config.storage.prefix.clone());

    let report = indexer.run(state.store.as_ref()).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::{LocalStore, ObjectStore};
    use crate::chat::ChatService;
    use crate::config::RagConfig;
    use crate::llm::FakeLlm;
    use crate::query::embedding::HashingEmbedder;
    use crate::storage::{shared, SqliteIndex};

    const PEER: ([u8; 4], u16) = ([192, 168, 1, 20], 50000);

    async fn state(dir: &std::path::Path, config: RagConfig) -> Arc<AppState> {
        let store = Arc::new(LocalStore::new(dir, "docs"));
        store.put("ml.txt", b"Machine learning has three types: supervised, unsupervised and reinforcement learning.".to_vec(), "text/plain").await.unwrap();
        store.put("aws.md", b"AWS Lambda runs code without provisioning servers.".to_vec(), "text/markdown").await.unwrap();

        let chat = ChatService::new(
            shared(SqliteIndex::open_in_memory().unwrap()),
            Arc::new(HashingEmbedder::new()),
            Arc::new(FakeLlm::new("Three types.")),
            &config,
        );
        Arc::new(AppState::new(chat, store, config))
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(PEER))
    }

    fn forwarded(ip: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", ip.parse().unwrap());
        headers
    }

    fn ask(session_id: Option<Uuid>, message: &str) -> Json<ChatRequest> {
        Json(ChatRequest { session_id, message: message.to_string() })
    }

    #[tokio::test]
    async fn test_client_id_ignores_forwarded_for_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), RagConfig::default()).await;
        let peer = SocketAddr::from(PEER);

        assert_eq!(client_id(&state, &HeaderMap::new(), peer), "192.168.1.20");
        assert_eq!(client_id(&state, &forwarded("203.0.113.7, 10.0.0.1"), peer), "192.168.1.20");

        let mut config = RagConfig::default();
        config.server.trust_forwarded_for = true;
        let proxied = self::state(dir.path(), config).await;
        assert_eq!(client_id(&proxied, &forwarded("203.0.113.7, 10.0.0.1"), peer), "203.0.113.7");
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_is_still_limited() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.safety.max_queries = 1;
        let state = state(dir.path(), config).await;

        let mut accepted = 0;
        for i in 0..5 {
            let headers = forwarded(&format!("10.0.0.{}", i));
            if chat(State(state.clone()), headers, peer(), ask(None, "How many documents?")).await.is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_rejected_chat_creates_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), RagConfig::default()).await;

        for _ in 0..10 {
            let err = chat(State(state.clone()), HeaderMap::new(), peer(), ask(Some(Uuid::new_v4()), "jailbreak"))
                .await
                .unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(state.sessions.len().await, 0);
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: Error| ApiError::from(e).status;
        assert_eq!(status(Error::RateLimited("x".into())), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(Error::Rejected("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(Error::Llm("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_reindex_then_chat() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), RagConfig::default()).await;

        let Json(report) = reindex(State(state.clone())).await.unwrap();
        assert_eq!(report.indexed, 2);

        let Json(docs) = documents(State(state.clone())).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.indexed && d.chunks == 1));

        let request = ChatRequest {
            session_id: None,
            message: "What are the types of machine learning?".to_string(),
        };
        let Json(reply) = chat(State(state.clone()), HeaderMap::new(), peer(), Json(request))
            .await
            .unwrap();
        assert_eq!(reply.response.answer, "Three types.");
        assert_eq!(reply.query_count, 1);

        let Json(history) = session(State(state.clone()), Path(reply.session_id)).await.unwrap();
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].content, "What are the types of machine learning?");
    }

    #[tokio::test]
    async fn test_rate_limited_chat_is_429() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.safety.max_queries = 1;
        let state = state(dir.path(), config).await;

        chat(State(state.clone()), HeaderMap::new(), peer(), ask(None, "How many documents?"))
            .await
            .unwrap();
        let err = chat(State(state.clone()), HeaderMap::new(), peer(), ask(None, "How many documents?"))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message, "Rate limit exceeded. Maximum 1 queries per hour.");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), RagConfig::default()).await;
        let err = session(State(state), Path(Uuid::new_v4())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), RagConfig::default()).await;
        let params = SearchParams { query: " ".to_string(), limit: None };
        let err = search(State(state), HeaderMap::new(), peer(), Query(params)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_counts_against_rate_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.safety.max_queries = 1;
        let state = state(dir.path(), config).await;
        reindex(State(state.clone())).await.unwrap();

        let params = || Query(SearchParams { query: "aws lambda".to_string(), limit: Some(1) });
        let Json(hits) = search(State(state.clone()), HeaderMap::new(), peer(), params()).await.unwrap();
        assert_eq!(hits[0].source, "aws.md");

        let err = search(State(state.clone()), HeaderMap::new(), peer(), params()).await.unwrap_err();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
    }
}
