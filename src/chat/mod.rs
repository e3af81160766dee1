//! Conversational layer: safety checks, retrieval, prompting and history

pub mod service;
pub mod session;

pub use service::{ChatResponse, ChatService, DocumentInfo};
pub use session::{ChatMessage, Role, Session, SessionStore};
