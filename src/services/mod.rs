pub mod conversation;
pub mod messaging;
pub mod notifications;
pub mod scheduling;
pub mod sessions;
pub mod slots;
pub mod store;
