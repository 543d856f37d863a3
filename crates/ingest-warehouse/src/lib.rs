//! Job planning, submission, and the fail-fast watch.

pub mod client;
pub mod fake_client;
pub mod job_id;
pub mod planner;
pub mod rest_client;

pub use client::{JobStatus, WarehouseClient};
pub use job_id::create_job_id;
pub use planner::{fail_fast_watch, plan_and_submit, PlanContext};
pub use rest_client::RestWarehouseClient;
