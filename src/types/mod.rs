//! 类型系统模块：定义请求、响应、消息与模型信息等核心数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything exchanged with a backend.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and non-empty content |
//! | [`ChatRequest`] | Generation request assembled by the caller |
//! | [`ChatResponse`] | Generation result stamped with provenance metadata |
//! | [`Generation`] | Adapter-level result before the client adds metadata |
//! | [`Usage`] | Token accounting reported by the backend |
//! | [`ModelInfo`] | One entry of a backend's model listing |
//!
//! ## Example
//!
//! ```rust
//! use ai_relay::types::{ChatRequest, Message};
//!
//! let request = ChatRequest::new(vec![
//!     Message::system("You summarise documents."),
//!     Message::user("Summarise the attached transcript."),
//! ])
//! .temperature(0.2)
//! .max_tokens(512);
//! assert!(request.validate().is_ok());
//! ```

pub mod message;
pub mod model;
pub mod request;
pub mod response;

pub use message::{Message, MessageRole};
pub use model::ModelInfo;
pub use request::ChatRequest;
pub use response::{ChatResponse, FinishReason, Generation, Usage};
