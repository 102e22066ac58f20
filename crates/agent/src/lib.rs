//! Conversation Runtime
//!
//! The boundary between messaging channels and the pure conversation engine in
//! `concierge-core`. It loads the stored conversation for a sender, runs one turn, stores the
//! result and always answers: when storage fails the traveler gets the fallback reply.
//!
//! Turns for the same sender are serialized with a per-identity async mutex; different
//! senders are processed in parallel.

pub mod runtime;
pub mod store;

pub use runtime::{ConversationRuntime, InboundMessage, RuntimeReply};
pub use store::{
    ConversationRecord, ConversationStore, InMemoryConversationStore, JsonFileConversationStore,
    StoreError,
};
