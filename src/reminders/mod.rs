pub mod repo;
pub mod scheduler;
