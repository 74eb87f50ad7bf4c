pub mod decision;
pub mod engine;
pub mod history;
pub mod loop_control;
pub mod state;
pub mod verifier;
