pub mod jobs;
pub mod repository;
pub mod stats;
pub mod temporal;
