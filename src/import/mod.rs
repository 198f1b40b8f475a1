//! Import pipeline: requests, publication and orchestration.

pub mod orchestrator;
pub mod publish;
pub mod request;

pub use orchestrator::{ImportOutcome, ImportReport, ImportState, Importer};
pub use publish::Publisher;
pub use request::{parse_repo_url, ImportRequest, Workspace, DEFAULT_BRANCH};
