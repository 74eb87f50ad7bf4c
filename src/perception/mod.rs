pub mod compression;
pub mod hashing;
pub mod scripted;
pub mod traits;
pub mod types;
