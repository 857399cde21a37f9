pub mod session_store;
pub mod user_repo;

pub use session_store::MemorySessionStore;
pub use user_repo::MemoryUserRepository;
