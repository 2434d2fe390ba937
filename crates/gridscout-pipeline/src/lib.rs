pub mod error;
pub mod hub;
pub mod messages;
pub mod orchestrator;
pub mod reporter;

pub use error::JobError;
pub use hub::{message_stream, ProgressHub, DEFAULT_CHANNEL_CAPACITY};
pub use messages::ProgressMessage;
pub use orchestrator::{JobOrchestrator, JobSummary, ScrapeRequest, StartedJob};
pub use reporter::ProgressReporter;
