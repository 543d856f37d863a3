//! Claim (idempotency) and lock (per-table mutual exclusion) primitives,
//! both built from conditional object-store writes.

pub mod claim;
pub mod lock;

pub use claim::{claim_key, claim_once};
pub use lock::{acquire, read_lock, reclaim, release, LockState, LOCK_FILENAME};
