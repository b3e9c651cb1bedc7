//! Performance API
//!
//! This crate exposes the performance timeline to a scripting runtime:
//! - `now`, `mark`, `measure` and timeline queries over marks and measures
//! - Observer handles whose dispatch callbacks run on a [`Scheduler`]
//! - Event counts, startup timing and test hooks
//! - Flat [`NativePerformanceEntry`] records for the binding layer
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use performance::{MeasureOptions, Performance, Scheduler, SchedulerPriority, Task};
//! use timeline::{HighResTimeStamp, PerformanceEntryReporter, ReporterConfig};
//!
//! #[derive(Default)]
//! struct Deferred(Mutex<Vec<Task>>);
//!
//! impl Scheduler for Deferred {
//!     fn schedule(&self, _priority: SchedulerPriority, task: Task) {
//!         self.0.lock().unwrap().push(task);
//!     }
//! }
//!
//! let reporter = Arc::new(PerformanceEntryReporter::new(ReporterConfig::default()));
//! let performance = Performance::new(reporter, Arc::new(Deferred::default()));
//!
//! performance.mark("start", Some(HighResTimeStamp::from_millis(0.0)));
//! performance.mark("end", Some(HighResTimeStamp::from_millis(10.0)));
//! let (_, duration) = performance
//!     .measure("span", MeasureOptions::new().with_start_mark("start").with_end_mark("end"))
//!     .unwrap();
//! assert_eq!(duration.as_millis(), 10.0);
//! ```

mod error;
pub mod logging;
mod native;
mod observer;
mod performance;
mod scheduler;

pub use error::{PerformanceError, PerformanceResult};
pub use logging::init_logging;
pub use native::{to_json, to_native_entries, NativePerformanceEntry};
pub use observer::{ObserveRequest, ObserverHandle};
pub use performance::{
    is_available_from_timeline, MeasureOptions, Performance, ENTRY_TYPES_AVAILABLE_FROM_TIMELINE,
};
pub use scheduler::{Scheduler, SchedulerPriority, Task, TokioScheduler};
