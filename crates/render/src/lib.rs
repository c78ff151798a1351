//! Render-provider integration and job orchestration.
//!
//! Provides the typed HTTP client for the external generative-video
//! provider, artifact persistence, and the three orchestration pieces
//! built on top of them: the dispatcher (submit + usage accounting), the
//! completion finalizer (the single authorized terminal transition), and
//! the client-driven status poller.

pub mod backend;
pub mod dispatcher;
pub mod finalizer;
pub mod poller;
pub mod service;
pub mod storage;

pub use backend::{BackendError, HttpRenderBackend, ProviderJobStatus, RenderBackend, RenderRequest, SubmitAccepted};
pub use dispatcher::DispatchError;
pub use finalizer::{FinalizeOutcome, TerminalOutcome};
pub use poller::{PollConfig, PollOutcome, PolledStatus, StatusPoller, StatusProbe};
pub use service::{JobStatusProbe, RenderService, StatusError};
pub use storage::{ArtifactStore, LocalArtifactStore, StorageError};
