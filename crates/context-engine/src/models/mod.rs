pub mod chat;

pub use chat::{Conversation, Message, QueryRequest, QueryResponse, Role};
