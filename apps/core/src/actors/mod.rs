pub mod jobs;
pub mod messages;
pub mod scheduler;
pub mod traits;
