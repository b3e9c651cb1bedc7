//! Performance Timeline
//!
//! This crate provides the in-process store behind a web-style performance
//! timeline:
//! - Timestamped entries (marks, measures, event timing, long tasks, resources)
//! - Bounded per-type buffers with eviction and drop counting
//! - Observers that receive matching entries with debounced dispatch requests
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use timeline::{
//!     HighResTimeStamp, ObserveOptions, ObserverConfig, PerformanceEntryReporter,
//!     PerformanceEntryType, PerformanceObserver, ReporterConfig,
//! };
//!
//! let reporter = Arc::new(PerformanceEntryReporter::new(ReporterConfig::default()));
//! let observer =
//!     PerformanceObserver::create(&reporter, Arc::new(|| {}), ObserverConfig::default());
//! observer.observe_type(PerformanceEntryType::Mark, ObserveOptions::default());
//!
//! reporter.report_mark("ready", HighResTimeStamp::from_millis(12.0));
//! assert_eq!(observer.take_records(true).len(), 1);
//! ```

mod buffer;
pub mod clock;
mod config;
mod entry;
mod error;
mod observer;
mod registry;
mod reporter;
pub mod startup;

pub use buffer::EntryBuffer;
pub use clock::{Clock, FixedClock, MonotonicClock};
pub use config::{
    ObserverConfig, ReporterConfig, EVENT_BUFFER_SIZE, LONG_TASK_BUFFER_SIZE,
    OBSERVER_BUFFER_SIZE, RESOURCE_TIMING_BUFFER_SIZE,
};
pub use entry::{
    sort_entries, EntryDetails, EventTiming, HighResDuration, HighResTimeStamp, PerformanceEntry,
    PerformanceEntryType, ResourceTiming,
};
pub use error::{TimelineError, TimelineResult};
pub use observer::{
    ObserveOptions, ObserverCallback, ObserverFilter, ObserverStatus, PerformanceObserver,
};
pub use registry::PerformanceObserverRegistry;
pub use reporter::PerformanceEntryReporter;
pub use startup::{StartupLogger, StartupMilestone};
