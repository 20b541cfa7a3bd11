pub mod cli;
pub mod errors;
pub mod fetch;
pub mod flatten;
pub mod merge;
pub mod models;
pub mod snapshot;
pub mod table;
