//! Work queue with visibility-timeout leases and a dead-letter pool.
//!
//! A received message stays invisible to other consumers until its lease
//! lapses; consumers either [`ack`](WorkQueue::ack) after committing their
//! results, [`release`](WorkQueue::release) for a retry, or
//! [`reject`](WorkQueue::reject) to dead-letter it. Messages that keep
//! coming back are dead-lettered automatically once their receive count
//! passes the configured limit.

mod memory;
mod postgres;
mod traits;

pub use memory::MemoryWorkQueue;
pub use postgres::PgWorkQueue;
pub use traits::{Delivery, LeaseToken, QueueConfig, QueueError, QueueResult, WorkQueue};
