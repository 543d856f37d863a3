//! Object-store gateway abstraction: the sole coordination primitive the
//! ingestion pipeline relies on.

pub mod gateway;
pub mod opendal_gateway;
pub mod ttl_cache;

pub use gateway::{ConditionalOutcome, ObjectMeta, ObjectStoreGateway};
pub use opendal_gateway::OpenDalGateway;
