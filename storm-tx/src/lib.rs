//! Storm Tx - Nested Transaction Manager (C7)
//!
//! A scope stack per execution context implementing the propagation matrix,
//! savepoints for `NESTED` scopes, timeouts, and the `(type_name, pk)`
//! observation map each frame owns for the write planner's dirty-check
//! baseline (spec.md §4.7).

mod frame;
mod handle;
mod manager;
mod propagation;

pub use frame::Frame;
pub use handle::TxHandle;
pub use manager::{ExecutionMode, TransactionManager, TxSettings};
pub use propagation::{Action, Propagation};
