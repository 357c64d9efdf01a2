//! Startup sequencing for the node container.
//!
//! The orchestrator runs one strictly sequential flow per process
//! invocation:
//! - resolve feature flags (done by the caller, threaded in)
//! - prune the supervision tree to the selected service set
//! - render configuration templates (networking only)
//! - prime configuration from the backend (networking only, best-effort)
//! - hand off to the process supervisor
//!
//! Fail-fast behavior: any fatal step aborts the sequence with a clear
//! error naming the last completed phase; nothing is retried and no
//! state is revisited.

mod sequencer;

pub use sequencer::{Handoff, Sequencer, StartupConfig, StartupPhase, StartupPlan};
