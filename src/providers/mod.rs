pub mod anthropic;
pub mod continuation;
pub mod factory;
pub mod gemini;
mod http;
pub mod markers;
pub mod openai;
pub mod traits;

pub use continuation::complete_with_continuation;
pub use factory::{create_provider, default_model};
pub use markers::{ReplyDirectives, parse_reply_markers};
pub use traits::{CallOptions, ChatMessage, ChatProvider, ChatRole};
