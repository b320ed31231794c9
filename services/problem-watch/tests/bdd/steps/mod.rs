//! BDD step definitions for problem-watch

pub mod duration_steps;
pub mod pipeline_steps;
