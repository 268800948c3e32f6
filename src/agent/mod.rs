//! Model access

pub mod llm;

pub use llm::{
    ChatClient, ChatMessage, ChatProvider, CompletionOptions, ImageOptions, ModelInfo,
    ProviderConfig, ProviderKind,
};
