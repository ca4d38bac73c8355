pub mod job;
pub mod requests;
pub mod summary;
