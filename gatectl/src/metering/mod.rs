//! Usage metering pipeline.
//!
//! The dataplane dispatch path records one usage event per dispatched request
//! ([`recorder`]); scheduler-driven background jobs later price those events
//! ([`cost`]) and roll them into per-user billing summaries ([`billing`]).
//! [`scheduler`] owns the timers driving both jobs.

pub mod billing;
pub mod cost;
pub mod recorder;
pub mod scheduler;

pub use billing::{BillingAggregator, BillingPeriod};
pub use cost::CostCalculator;
pub use recorder::{DispatchOutcome, UsageRecorder};
pub use scheduler::MeteringScheduler;
