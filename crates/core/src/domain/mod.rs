pub mod conversation;
pub mod slots;
