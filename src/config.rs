use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub safety: SafetyConfig,
    pub server: ServerConfig,
    pub topics: Vec<Topic>,
    /// Suggested questions shown in the web UI
    pub example_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    /// Custom S3 endpoint (MinIO, LocalStack)
    pub endpoint_url: Option<String>,
    /// Serve documents from a local directory instead of S3
    pub local_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            prefix: String::new(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            local_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub database: PathBuf,
    /// Where fastembed keeps downloaded model files
    pub model_cache: Option<PathBuf>,
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            database: default_database_path_in(Path::new(".")),
            model_cache: None,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per chunk
    pub chunk_size: usize,
    /// Words shared between consecutive chunks
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, overlap: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// How many of the retrieved chunks go into the prompt
    pub answer_chunks: usize,
    /// Best-chunk score below which the question is treated as off-topic
    pub min_relevance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3, answer_chunks: 2, min_relevance: 0.15 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Bedrock,
}

impl ProviderKind {
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Bedrock => "anthropic.claude-instant-v1",
        }
    }

    /// Bedrock authenticates through the AWS credential chain
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Bedrock => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    /// Model id; each provider has its own default
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    /// Environment variable holding the API key (unused for Bedrock)
    pub api_key_env: Option<String>,
    /// API host override; for Bedrock, a custom runtime endpoint
    pub base_url: Option<String>,
    /// Bedrock region; falls back to the AWS default chain
    pub region: Option<String>,
    pub timeout_secs: u64,
    /// Rough dollar cost of one model answer, shown next to answers
    pub cost_per_answer: Option<f64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: None,
            max_tokens: 500,
            temperature: 0.1,
            top_p: 0.9,
            api_key_env: None,
            base_url: None,
            region: None,
            timeout_secs: 60,
            cost_per_answer: Some(0.001),
        }
    }
}

impl LlmConfig {
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(self.provider.default_model())
    }

    pub fn key_env(&self) -> Option<&str> {
        self.api_key_env.as_deref().or(self.provider.default_api_key_env())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_queries: usize,
    pub window_minutes: u64,
    pub max_query_chars: usize,
    pub blocked_patterns: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_queries: 20,
            window_minutes: 60,
            max_query_chars: 500,
            blocked_patterns: [
                "ignore previous instructions",
                "system prompt",
                "jailbreak",
                "hack",
                "exploit",
                "malicious",
                "harmful content",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub ui_dir: PathBuf,
    /// Key rate limits on `X-Forwarded-For`; only safe behind a proxy that sets it
    pub trust_forwarded_for: bool,
    /// Oldest sessions are dropped beyond this many
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8501,
            ui_dir: PathBuf::from("ui"),
            trust_forwarded_for: false,
            max_sessions: 1000,
        }
    }
}

/// A subject area advertised to users of the assistant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub name: String,
    pub description: String,
}

impl RagConfig {
    /// Apply `RAGASSIST_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = lookup("RAGASSIST_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(region) = lookup("RAGASSIST_REGION") {
            self.storage.region = region;
        }
        if let Some(database) = lookup("RAGASSIST_DATABASE") {
            self.index.database = PathBuf::from(database);
        }
        if let Some(port) = lookup("RAGASSIST_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid RAGASSIST_PORT: {}", port),
            }
        }
    }

    /// Name used for chunk URIs: the bucket, or the local directory name
    pub fn store_name(&self) -> String {
        match &self.storage.local_dir {
            Some(dir) => dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "local".to_string()),
            None => self.storage.bucket.clone(),
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.storage.local_dir.is_none() {
            validate_bucket_name(&self.storage.bucket)?;
            if self.storage.region.trim().is_empty() {
                return Err(Error::Config("storage.region must not be empty".to_string()));
            }
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".to_string()));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".to_string()));
        }
        if self.retrieval.answer_chunks == 0 || self.retrieval.answer_chunks > self.retrieval.top_k {
            return Err(Error::Config(format!(
                "retrieval.answer_chunks must be between 1 and top_k ({})",
                self.retrieval.top_k
            )));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_relevance) {
            return Err(Error::Config("retrieval.min_relevance must be within [-1, 1]".to_string()));
        }
        if self.safety.max_queries == 0 || self.safety.window_minutes == 0 {
            return Err(Error::Config("safety limits must be positive".to_string()));
        }
        if self.server.max_sessions == 0 {
            return Err(Error::Config("server.max_sessions must be positive".to_string()));
        }
        if self.llm.cost_per_answer.is_some_and(|c| c < 0.0) {
            return Err(Error::Config("llm.cost_per_answer must not be negative".to_string()));
        }
        Ok(())
    }
}

/// S3 bucket naming rules: 3-63 chars of lowercase letters, digits, '-' and '.',
/// not starting or ending with a hyphen.
fn validate_bucket_name(bucket: &str) -> crate::Result<()> {
    use crate::Error;

    if bucket.is_empty() {
        return Err(Error::Config(
            "storage.bucket is required (or set storage.local_dir)".to_string(),
        ));
    }
    if bucket.len() < 3 || bucket.len() > 63 {
        return Err(Error::Config(format!(
            "bucket name '{}' must be between 3 and 63 characters",
            bucket
        )));
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(Error::Config(format!(
            "bucket name '{}' can only contain lowercase letters, numbers, hyphens, and dots",
            bucket
        )));
    }
    if bucket.starts_with('-') || bucket.ends_with('-') {
        return Err(Error::Config(format!(
            "bucket name '{}' cannot start or end with a hyphen",
            bucket
        )));
    }
    Ok(())
}

/// Topics written by `ragassist init` for the sample document set
pub fn sample_topics() -> Vec<Topic> {
    [
        ("AI and Machine Learning", "Types of ML, deep learning, applications, challenges"),
        ("AWS Cloud Services", "EC2, S3, Lambda, databases, security, best practices"),
        ("Software Development", "Agile, DevOps, CI/CD, testing, architecture patterns"),
    ]
    .iter()
    .map(|(name, description)| Topic {
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}

/// Example questions matching [`sample_topics`]
pub fn sample_questions() -> Vec<String> {
    [
        "What are the types of machine learning?",
        "How does AWS Lambda work?",
        "What is continuous integration?",
        "What are SOLID principles?",
        "How does Amazon S3 work?",
    ]
    .iter()
    .map(|q| q.to_string())
    .collect()
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("ragassist.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".ragassist").join("index.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<RagConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RagConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &RagConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".ragassist/";

    let mut content = String::new();
    if gitignore_path.exists() {
        content = std::fs::read_to_string(&gitignore_path)?;
        if content.lines().any(|line| line.trim() == entry) {
            return Ok(());
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn s3_config(bucket: &str) -> RagConfig {
        let mut config = RagConfig::default();
        config.storage.bucket = bucket.to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.safety.max_queries, 20);
        assert_eq!(config.server.port, 8501);
        assert!(!config.server.trust_forwarded_for);
        assert_eq!(config.index.database, PathBuf::from("./.ragassist/index.db"));
    }

    #[test]
    fn test_llm_defaults_follow_provider() {
        let mut llm = LlmConfig::default();
        assert_eq!(llm.model_name(), "claude-3-5-haiku-latest");
        assert_eq!(llm.key_env(), Some("ANTHROPIC_API_KEY"));

        llm.provider = ProviderKind::OpenAi;
        assert_eq!(llm.model_name(), "gpt-4o-mini");
        assert_eq!(llm.key_env(), Some("OPENAI_API_KEY"));

        llm.provider = ProviderKind::Bedrock;
        assert_eq!(llm.model_name(), "anthropic.claude-instant-v1");
        assert_eq!(llm.key_env(), None);

        let config: RagConfig = toml::from_str(
            r#"
            [llm]
            provider = "openai"
            model = "gpt-4o"
            api_key_env = "MY_OPENAI_KEY"
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model_name(), "gpt-4o");
        assert_eq!(config.llm.key_env(), Some("MY_OPENAI_KEY"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RagConfig = toml::from_str(
            r#"
            [storage]
            bucket = "my-rag-documents"

            [retrieval]
            top_k = 5

            [[topics]]
            name = "AWS Cloud Services"
            description = "EC2, S3, Lambda"
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.bucket, "my-rag-documents");
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.answer_chunks, 2);
        assert_eq!(config.topics.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bucket() {
        assert!(s3_config("my-rag-documents").validate().is_ok());
        assert!(s3_config("").validate().is_err());
        assert!(s3_config("ab").validate().is_err());
        assert!(s3_config("My_Bucket").validate().is_err());
        assert!(s3_config("-bucket").validate().is_err());

        let mut local = RagConfig::default();
        local.storage.local_dir = Some(PathBuf::from("docs"));
        assert!(local.validate().is_ok());
        assert_eq!(local.store_name(), "docs");
    }

    #[test]
    fn test_validate_chunking_and_retrieval() {
        let mut config = s3_config("docs-bucket");
        config.chunking.overlap = 500;
        assert!(config.validate().is_err());

        let mut config = s3_config("docs-bucket");
        config.retrieval.answer_chunks = 4;
        assert!(config.validate().is_err());

        let mut config = s3_config("docs-bucket");
        config.retrieval.min_relevance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RAGASSIST_BUCKET", "override-bucket"),
            ("RAGASSIST_PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = RagConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.storage.bucket, "override-bucket");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.region, "us-east-1");
    }

    #[test]
    fn test_write_and_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragassist.toml");
        let mut config = s3_config("roundtrip-bucket");
        config.topics = sample_topics();
        config.example_questions = sample_questions();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.storage.bucket, "roundtrip-bucket");
        assert_eq!(loaded.topics, sample_topics());
        assert_eq!(loaded.example_questions.len(), 5);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_ensure_gitignore_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/").unwrap();

        ensure_gitignore(dir.path()).unwrap();
        ensure_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "target/\n.ragassist/\n");
    }
}
