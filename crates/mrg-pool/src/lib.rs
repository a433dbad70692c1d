//! A pool of finalization guardians for a tracing collector.
//!
//! Registering a reference takes a guardian from the pool. When a trace at [`Rank::Final`]
//! finds the object unreachable, the guardian keeps it alive, becomes FINAL and queues a
//! [`Message`]. The client polls the message, finalizes the object, and deletes the message
//! to return the guardian to the pool:
//!
//! ```text
//! FREE --register--> PREFINAL --scan, unreachable--> FINAL --message_delete--> FREE
//!                       \--deregister--> FREE
//! ```
//!
//! Mutation and scanning both take `&mut self`, so the host serialises them.

mod error;
mod guardian;
mod pool;
mod trace;

pub use error::{PoolError, Result};
pub use guardian::{GuardianId, GuardianState};
pub use pool::{Message, MrgPool, PoolStats, REF_SIZE};
pub use trace::{Direct, Rank, Ref, RefBarrier, Tracer};
