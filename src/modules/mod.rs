pub mod jobs;
pub mod provider;
