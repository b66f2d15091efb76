// ABOUTME: Session credential storage for the MoovyMed API client.
// ABOUTME: Provides the Session model, the SessionStore trait, and memory and file-backed stores.

pub mod file;
pub mod memory;
pub mod model;
pub mod store;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
pub use model::Session;
pub use store::{SessionError, SessionStore};
