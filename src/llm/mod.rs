pub mod prompt;
pub mod provider;
pub mod providers;
pub mod types;
