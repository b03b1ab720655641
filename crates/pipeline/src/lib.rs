//! Conversational order pipeline.
//!
//! One inbound message job flows through:
//!
//! ```text
//! JobQueue → MessagePipeline → Classifier → parse/validate → route
//!                 │                                            │
//!                 │               ┌── OrderAssembler ── OrderStore (atomic commit)
//!                 │               │
//!                 └── ReplySender ┴── EscalationNotifier (parallel, < 0.6)
//! ```
//!
//! Every path ends with exactly one outbound reply, persisted as a
//! conversation turn. Redelivered jobs are safe: order creation dedups on
//! the source message id.

pub mod assembler;
pub mod ingress;
pub mod orchestrator;
pub mod worker;

pub use assembler::{AssembleOutcome, AssemblyError, OrderAssembler};
pub use ingress::ingest;
pub use orchestrator::{MessagePipeline, PipelineError, PipelineOptions, PipelineOutcome};
pub use worker::{spawn_reaper, spawn_workers, Worker, WorkerPool};
