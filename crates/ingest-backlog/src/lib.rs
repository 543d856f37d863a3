//! The per-table backlog queue: publisher (enqueue + schedule), subscriber
//! (single drain loop), and the two-sided race-safety monitor that keeps
//! them from orphaning an enqueued item.

pub mod item;
pub mod publisher;
pub mod subscriber;

pub use item::{backlog_key, backlog_key_to_success_path, get_next_backlog_item, remove_oldest_backlog_item};
pub use publisher::{publish, start_backfill_subscriber_if_not_running, BACKFILL_FILENAME};
pub use subscriber::{run as run_subscriber, SubscriberConfig};
