//! Debounced, single-flight save coordination for one editable resource.
//!
//! A [`SaveCoordinator`] turns a stream of "something changed, persist it"
//! signals into serialized calls of a caller-supplied [`SaveOperation`]:
//! * bursts of [`SaveCoordinator::schedule`] calls collapse into one save after a
//!   quiet period, keeping only the latest operation
//! * at most one operation executes at a time; submissions arriving while busy
//!   wait in a FIFO queue
//! * failures are retried with capped exponential backoff and reported through a
//!   [`SaveReporter`] until the retry budget runs out
//! * [`SaveCoordinator::cancel_pending`] suppresses the interpretation of
//!   in-flight work without pretending to undo it
//!
//! Every transition publishes an immutable [`CoordinatorState`] snapshot.

#![warn(missing_docs)]

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
mod executor;
pub mod operation;
pub mod queue;
pub mod report;
pub mod state;
pub mod token;

pub use backoff::BackoffPolicy;
pub use config::{CoordinatorConfig, QueueResume};
pub use coordinator::{CoordinatorBuilder, SaveCoordinator};
pub use error::{ConfigError, CoordinatorError, SaveError};
pub use operation::{SaveContext, SaveOperation, SaveResult, Timestamp};
pub use report::{FailureKind, FailureReport, SaveReporter, TracingReporter};
pub use state::{CoordinatorState, SavePhase, StateStream};
pub use token::CancelToken;
