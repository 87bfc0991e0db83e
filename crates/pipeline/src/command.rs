//! Command contract and receipts.

use aggregate_store::{Aggregate, AggregateState, ValidationError};
use common::{AggregateId, EventKind, Version};
use event_bus::PublishReport;
use event_log::Event;

/// A request to mutate one aggregate.
///
/// Commands are transient: created by a worker, consumed once by the
/// pipeline, then discarded. Their durable trace is the [`Event`]
/// appended on commit. `apply` must be a pure function of the presented
/// state — the pipeline may call it again with a refreshed state when the
/// issuer's version was stale.
pub trait Command: Send + Sync {
    /// The aggregate this command targets.
    fn aggregate_id(&self) -> &AggregateId;

    /// The version the issuer last observed. `None` means no optimistic
    /// check — insert only.
    fn expected_version(&self) -> Option<Version>;

    /// The kind of event a successful commit records.
    fn kind(&self) -> EventKind;

    /// Validates the command against the current state and produces the
    /// replacement state, or rejects on domain grounds.
    fn apply(&self, state: &AggregateState) -> std::result::Result<AggregateState, ValidationError>;
}

/// Lifecycle of one command inside the pipeline.
///
/// ```text
/// Pending ──► Validating ──┬──► Committed
///                          ├──► Rejected    (domain failure, terminal)
///                          └──► Conflicted  (stale version, retries exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    /// Accepted, not yet executed.
    Pending,

    /// Version check and domain validation in progress.
    Validating,

    /// Mutation committed; event appended and published.
    Committed,

    /// Domain validation failed; no retry.
    Rejected,

    /// Expected version was stale and retries ran out.
    Conflicted,
}

impl CommandState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandState::Pending => "Pending",
            CommandState::Validating => "Validating",
            CommandState::Committed => "Committed",
            CommandState::Rejected => "Rejected",
            CommandState::Conflicted => "Conflicted",
        }
    }

    /// Returns true if the command can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandState::Committed | CommandState::Rejected | CommandState::Conflicted
        )
    }
}

impl std::fmt::Display for CommandState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a successfully committed command produced.
#[derive(Debug)]
pub struct CommandReceipt {
    /// The aggregate after the commit.
    pub aggregate: Aggregate,

    /// The event recorded for this commit.
    pub event: Event,

    /// Outcome of publishing the event, including collected handler
    /// failures. A failed handler never unwinds the commit.
    pub publish: PublishReport,

    /// How many commit attempts were made (1 = no conflict).
    pub attempts: u32,
}

impl CommandReceipt {
    /// The version the commit produced.
    pub fn version(&self) -> Version {
        self.aggregate.version
    }
}
