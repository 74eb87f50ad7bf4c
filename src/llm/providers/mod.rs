pub mod heuristic;
pub mod openai_compatible;
