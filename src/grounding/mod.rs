pub mod grounder;
pub mod similarity;
