pub mod library;
pub mod store;
pub mod types;
