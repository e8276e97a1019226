//! Round coordination — the federated training state machine.
//!
//! The coordinator owns round state and the client registry behind a
//! single lock; the aggregator is invoked inline once a round's quorum
//! of client updates is present.

pub mod coordinator;
pub mod state;

pub use coordinator::{GlobalModel, RoundCoordinator, ServerConfigInfo};
pub use state::{PendingUpdate, RoundPhase, RoundState, RoundSummary, TrainingStatus};
