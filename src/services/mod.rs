pub mod account_service;
pub mod session_service;
pub mod session_store;
pub mod token_codec;
pub mod user_repository;
