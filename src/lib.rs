//! Lingua Coach - adaptive language tutoring library
//!
//! A tutor that remembers the learner:
//! - Learning memory of grammar mistakes, vocabulary gaps, conversations and weak areas
//! - Mode-specific system prompts built from that memory
//! - Lessons, roleplay, media simplification and vocabulary cards via a chat-completion API
//! - Key-value snapshot persistence in SQLite
//!
//! # Example
//!
//! ```ignore
//! use lingua_coach::memory::{LearningMemory, MemoryManager};
//!
//! let manager = MemoryManager::default();
//! let memory = manager.record_grammar_mistake(
//!     &LearningMemory::default(),
//!     "ser-estar",
//!     "Yo soy cansado",
//! );
//! assert_eq!(memory.grammar_mistakes[0].mistake_count, 1);
//! ```

// Core modules
pub mod types;
pub mod error;
pub mod memory;
pub mod store;
pub mod agent;
pub mod security;
pub mod config;

// Tutoring
pub mod modes;
pub mod profile;
pub mod tutor;
pub mod challenge;
pub mod session;
pub mod cli;

pub use agent::{ChatClient, ChatProvider};
pub use config::Config;
pub use error::{TutorError, TutorResult};
pub use memory::{LearningMemory, MemoryManager};
pub use session::LearningSession;
pub use store::{InMemoryStore, KeyValueStore, SnapshotStore, SqliteKvStore};
pub use tutor::{build_system_prompt, Tutor};
pub use types::{ConversationRole, LearningMode, TargetLanguage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - Adaptive language tutor", NAME, VERSION)
}
