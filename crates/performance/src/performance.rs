//! The performance API exposed to a scripting runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use timeline::{
    Clock, HighResDuration, HighResTimeStamp, MonotonicClock, ObserverCallback, ObserverConfig,
    PerformanceEntryReporter, PerformanceEntryType, PerformanceObserver, StartupLogger,
};

use crate::error::{PerformanceError, PerformanceResult};
use crate::native::{to_native_entries, NativePerformanceEntry};
use crate::observer::{ObserveRequest, ObserverHandle};
use crate::scheduler::{Scheduler, SchedulerPriority};

/// Entry types visible through `get_entries*`. Other types are only
/// delivered to observers.
pub const ENTRY_TYPES_AVAILABLE_FROM_TIMELINE: [PerformanceEntryType; 2] =
    [PerformanceEntryType::Mark, PerformanceEntryType::Measure];

/// Whether an entry type can be read back through `get_entries*`.
pub fn is_available_from_timeline(entry_type: PerformanceEntryType) -> bool {
    ENTRY_TYPES_AVAILABLE_FROM_TIMELINE.contains(&entry_type)
}

/// Optional arguments of [`Performance::measure`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureOptions {
    pub start_time: Option<HighResTimeStamp>,
    pub end_time: Option<HighResTimeStamp>,
    pub duration: Option<HighResDuration>,
    pub start_mark: Option<String>,
    pub end_mark: Option<String>,
}

impl MeasureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_time(mut self, ts: HighResTimeStamp) -> Self {
        self.start_time = Some(ts);
        self
    }

    pub fn with_end_time(mut self, ts: HighResTimeStamp) -> Self {
        self.end_time = Some(ts);
        self
    }

    pub fn with_duration(mut self, duration: HighResDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_start_mark(mut self, name: &str) -> Self {
        self.start_mark = Some(name.to_string());
        self
    }

    pub fn with_end_mark(mut self, name: &str) -> Self {
        self.end_mark = Some(name.to_string());
        self
    }
}

/// Performance module for one scripting runtime.
///
/// Entries go to a shared [`PerformanceEntryReporter`]; observer dispatch
/// callbacks are handed to a [`Scheduler`] at idle priority.
pub struct Performance {
    reporter: Arc<PerformanceEntryReporter>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    startup: Arc<StartupLogger>,
    observer_config: ObserverConfig,
    forced_now: Mutex<Option<HighResTimeStamp>>,
}

impl std::fmt::Debug for Performance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Performance")
            .field("reporter", &self.reporter)
            .field("observer_config", &self.observer_config)
            .finish_non_exhaustive()
    }
}

impl Performance {
    /// Create a performance module backed by `reporter`.
    pub fn new(reporter: Arc<PerformanceEntryReporter>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            reporter,
            scheduler,
            clock: Arc::new(MonotonicClock),
            startup: Arc::clone(StartupLogger::instance()),
            observer_config: ObserverConfig::default(),
            forced_now: Mutex::new(None),
        }
    }

    /// Create a performance module backed by the process-wide reporter.
    pub fn with_global_reporter(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::new(Arc::clone(PerformanceEntryReporter::instance()), scheduler)
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different startup logger.
    pub fn with_startup_logger(mut self, startup: Arc<StartupLogger>) -> Self {
        self.startup = startup;
        self
    }

    /// Configure observers created from now on.
    pub fn with_observer_config(mut self, config: ObserverConfig) -> Self {
        self.observer_config = config;
        self
    }

    pub fn reporter(&self) -> &Arc<PerformanceEntryReporter> {
        &self.reporter
    }

    fn forced_now(&self) -> MutexGuard<'_, Option<HighResTimeStamp>> {
        self.forced_now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current time, or the forced test timestamp if one is set.
    pub fn now(&self) -> HighResTimeStamp {
        let forced = *self.forced_now();
        forced.unwrap_or_else(|| self.clock.now())
    }

    fn mark_time(&self, name: &str) -> PerformanceResult<HighResTimeStamp> {
        self.reporter
            .get_mark_time(name)
            .ok_or_else(|| PerformanceError::MarkNotFound(name.to_string()))
    }

    /// Record a mark at `start_time`, or now. Returns the stored start time.
    pub fn mark(&self, name: &str, start_time: Option<HighResTimeStamp>) -> HighResTimeStamp {
        let start_time = start_time.unwrap_or_else(|| self.now());
        self.reporter.report_mark(name, start_time).start_time
    }

    /// Record a measure.
    ///
    /// Start: explicit time, else the start mark, else zero.
    /// End: explicit time, else start + duration, else the end mark, else now.
    /// A named mark that was never recorded fails with
    /// [`PerformanceError::MarkNotFound`].
    pub fn measure(
        &self,
        name: &str,
        options: MeasureOptions,
    ) -> PerformanceResult<(HighResTimeStamp, HighResDuration)> {
        let start_time = match (options.start_time, &options.start_mark) {
            (Some(ts), _) => ts,
            (None, Some(mark)) => self.mark_time(mark)?,
            (None, None) => HighResTimeStamp::ZERO,
        };

        let end_time = match (options.end_time, options.duration, &options.end_mark) {
            (Some(ts), _, _) => ts,
            (None, Some(duration), _) => start_time + duration,
            (None, None, Some(mark)) => self.mark_time(mark)?,
            (None, None, None) => self.now(),
        };

        let entry = self.reporter.report_measure(name, start_time, end_time);
        Ok((entry.start_time, entry.duration))
    }

    /// Record a measure from arguments already defaulted by the caller.
    ///
    /// Marks override the given times. Without an end mark, `duration`
    /// extends from the start; without either, an end before the start is
    /// replaced by the current time.
    pub fn measure_with_result(
        &self,
        name: &str,
        start_time: HighResTimeStamp,
        end_time: HighResTimeStamp,
        duration: Option<HighResDuration>,
        start_mark: Option<&str>,
        end_mark: Option<&str>,
    ) -> PerformanceResult<(HighResTimeStamp, HighResDuration)> {
        let start_time = match start_mark {
            Some(mark) => self.mark_time(mark)?,
            None => start_time,
        };

        let end_time = match (end_mark, duration) {
            (Some(mark), _) => self.mark_time(mark)?,
            (None, Some(duration)) => start_time + duration,
            (None, None) if end_time < start_time => self.now(),
            (None, None) => end_time,
        };

        let entry = self.reporter.report_measure(name, start_time, end_time);
        Ok((entry.start_time, entry.duration))
    }

    /// Remove marks, optionally only those named `name`.
    pub fn clear_marks(&self, name: Option<&str>) {
        self.reporter.clear_entries(PerformanceEntryType::Mark, name);
    }

    /// Remove measures, optionally only those named `name`.
    pub fn clear_measures(&self, name: Option<&str>) {
        self.reporter.clear_entries(PerformanceEntryType::Measure, name);
    }

    /// All marks and measures, sorted by start time.
    pub fn get_entries(&self) -> Vec<NativePerformanceEntry> {
        let entries = self
            .reporter
            .get_entries_of_types(&ENTRY_TYPES_AVAILABLE_FROM_TIMELINE, None);
        to_native_entries(&entries)
    }

    /// Marks and measures named `name`, optionally of one type only.
    pub fn get_entries_by_name(
        &self,
        name: &str,
        entry_type: Option<PerformanceEntryType>,
    ) -> Vec<NativePerformanceEntry> {
        let entries = match entry_type {
            Some(entry_type) if is_available_from_timeline(entry_type) => {
                self.reporter.get_entries_of_types(&[entry_type], Some(name))
            }
            Some(_) => Vec::new(),
            None => self
                .reporter
                .get_entries_of_types(&ENTRY_TYPES_AVAILABLE_FROM_TIMELINE, Some(name)),
        };
        to_native_entries(&entries)
    }

    /// Entries of one type; empty for types not available from the timeline.
    pub fn get_entries_by_type(
        &self,
        entry_type: PerformanceEntryType,
    ) -> Vec<NativePerformanceEntry> {
        if !is_available_from_timeline(entry_type) {
            return Vec::new();
        }
        to_native_entries(&self.reporter.get_entries_of_types(&[entry_type], None))
    }

    /// Occurrence counts per event name.
    pub fn get_event_counts(&self) -> Vec<(String, u32)> {
        self.reporter.get_event_counts()
    }

    /// Application startup milestones.
    pub fn get_startup_timing(&self) -> HashMap<String, f64> {
        self.startup.startup_timing()
    }

    /// Entry types the timeline can record.
    pub fn get_supported_entry_types(&self) -> Vec<PerformanceEntryType> {
        PerformanceEntryReporter::supported_entry_types().to_vec()
    }

    /// Create an observer whose dispatch requests run `callback` on the
    /// scheduler at idle priority.
    ///
    /// The observer lives as long as the returned handle (and its clones).
    /// A callback that captures its own handle keeps the observer alive until
    /// it is disconnected.
    pub fn create_observer<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let scheduler = Arc::clone(&self.scheduler);
        let dispatch: ObserverCallback = Arc::new(move || {
            let callback = Arc::clone(&callback);
            scheduler.schedule(SchedulerPriority::Idle, Box::new(move || (*callback)()));
        });

        let observer =
            PerformanceObserver::create(&self.reporter, dispatch, self.observer_config.clone());
        tracing::debug!(target: "performance::observer", "observer created");
        ObserverHandle::new(observer)
    }

    /// Start (or change) what an observer receives.
    pub fn observe(&self, handle: &ObserverHandle, request: &ObserveRequest) {
        if let Some(observer) = handle.observer() {
            request.apply(observer);
        }
    }

    /// Stop an observer. Safe to call repeatedly or on a detached handle.
    pub fn disconnect(&self, handle: &ObserverHandle) {
        if let Some(observer) = handle.observer() {
            observer.disconnect();
        }
    }

    /// Drain an observer's pending records.
    pub fn take_records(&self, handle: &ObserverHandle, sort: bool) -> Vec<NativePerformanceEntry> {
        match handle.observer() {
            Some(observer) => to_native_entries(&observer.take_records(sort)),
            None => Vec::new(),
        }
    }

    /// Entries an observer dropped because its queue was full.
    pub fn get_dropped_entries_count(&self, handle: &ObserverHandle) -> u64 {
        handle
            .observer()
            .map(|observer| observer.dropped_entries_count())
            .unwrap_or(0)
    }

    /// Force [`now`](Self::now) to return `ts`; `None` restores the clock.
    pub fn set_current_time_stamp_for_testing(&self, ts: Option<HighResTimeStamp>) {
        *self.forced_now() = ts;
    }

    /// Reset event counts.
    pub fn clear_event_counts_for_testing(&self) {
        self.reporter.clear_event_counts();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Task;
    use timeline::{FixedClock, ReporterConfig, StartupMilestone};

    /// Scheduler that queues tasks until the test runs them.
    #[derive(Default)]
    struct ManualScheduler {
        tasks: Mutex<Vec<Task>>,
    }

    impl ManualScheduler {
        fn pending(&self) -> usize {
            self.tasks.lock().unwrap().len()
        }

        fn run_all(&self) {
            let tasks: Vec<Task> = std::mem::take(&mut *self.tasks.lock().unwrap());
            for task in tasks {
                task();
            }
        }
    }

    impl Scheduler for ManualScheduler {
        fn schedule(&self, _priority: SchedulerPriority, task: Task) {
            self.tasks.lock().unwrap().push(task);
        }
    }

    fn ts(ms: f64) -> HighResTimeStamp {
        HighResTimeStamp::from_millis(ms)
    }

    fn setup() -> (Performance, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::default());
        let reporter = Arc::new(PerformanceEntryReporter::new(ReporterConfig::default()));
        let performance = Performance::new(reporter, scheduler.clone())
            .with_clock(Arc::new(FixedClock::new(ts(100.0))))
            .with_startup_logger(Arc::new(StartupLogger::new()));
        (performance, scheduler)
    }

    #[test]
    fn test_now_override() {
        let (performance, _) = setup();
        assert_eq!(performance.now(), ts(100.0));

        performance.set_current_time_stamp_for_testing(Some(ts(5.0)));
        assert_eq!(performance.now(), ts(5.0));

        performance.set_current_time_stamp_for_testing(None);
        assert_eq!(performance.now(), ts(100.0));
    }

    #[test]
    fn test_mark_defaults_to_now() {
        let (performance, _) = setup();
        assert_eq!(performance.mark("a", None), ts(100.0));
        assert_eq!(performance.mark("b", Some(ts(3.0))), ts(3.0));
    }

    #[test]
    fn test_measure_between_marks() {
        let (performance, _) = setup();
        performance.mark("start", Some(ts(0.0)));
        performance.mark("end", Some(ts(10.0)));

        let result = performance
            .measure("span", MeasureOptions::new().with_start_mark("start").with_end_mark("end"))
            .unwrap();
        assert_eq!(result, (ts(0.0), HighResDuration::from_millis(10.0)));
    }

    #[test]
    fn test_measure_missing_mark() {
        let (performance, _) = setup();
        performance.mark("b", Some(ts(10.0)));

        let err = performance
            .measure("x", MeasureOptions::new().with_start_mark("a").with_end_mark("b"))
            .unwrap_err();
        assert!(matches!(err, PerformanceError::MarkNotFound(ref name) if name == "a"));

        let err = performance
            .measure("x", MeasureOptions::new().with_end_mark("missing"))
            .unwrap_err();
        assert_eq!(err.to_string(), "The mark 'missing' does not exist.");
        assert!(performance.get_entries_by_type(PerformanceEntryType::Measure).is_empty());
    }

    #[test]
    fn test_measure_precedence() {
        let (performance, _) = setup();
        performance.mark("m", Some(ts(50.0)));

        // Explicit start wins over the start mark
        let (start, _) = performance
            .measure("a", MeasureOptions::new().with_start_time(ts(2.0)).with_start_mark("m"))
            .unwrap();
        assert_eq!(start, ts(2.0));

        // No start at all defaults to zero, no end defaults to now
        let (start, duration) = performance.measure("b", MeasureOptions::new()).unwrap();
        assert_eq!(start, ts(0.0));
        assert_eq!(duration, HighResDuration::from_millis(100.0));

        // Duration wins over the end mark
        let (_, duration) = performance
            .measure(
                "c",
                MeasureOptions::new()
                    .with_start_time(ts(10.0))
                    .with_duration(HighResDuration::from_millis(5.0))
                    .with_end_mark("m"),
            )
            .unwrap();
        assert_eq!(duration, HighResDuration::from_millis(5.0));

        // Explicit end wins over duration
        let (_, duration) = performance
            .measure(
                "d",
                MeasureOptions::new()
                    .with_start_time(ts(10.0))
                    .with_end_time(ts(30.0))
                    .with_duration(HighResDuration::from_millis(5.0)),
            )
            .unwrap();
        assert_eq!(duration, HighResDuration::from_millis(20.0));
    }

    #[test]
    fn test_measure_with_result_end_before_start_uses_now() {
        let (performance, _) = setup();
        let (start, duration) = performance
            .measure_with_result("q", ts(40.0), ts(0.0), None, None, None)
            .unwrap();
        assert_eq!(start, ts(40.0));
        assert_eq!(duration, HighResDuration::from_millis(60.0));

        performance.mark("s", Some(ts(1.0)));
        performance.mark("e", Some(ts(4.0)));
        let (start, duration) = performance
            .measure_with_result(
                "r",
                ts(0.0),
                ts(0.0),
                Some(HighResDuration::from_millis(100.0)),
                Some("s"),
                Some("e"),
            )
            .unwrap();
        assert_eq!(start, ts(1.0));
        assert_eq!(duration, HighResDuration::from_millis(3.0));

        assert!(performance
            .measure_with_result("z", ts(0.0), ts(1.0), None, Some("nope"), None)
            .is_err());
    }

    #[test]
    fn test_clear_marks_keeps_measures() {
        let (performance, _) = setup();
        performance.mark("a", Some(ts(1.0)));
        performance.mark("b", Some(ts(2.0)));
        performance
            .measure("m", MeasureOptions::new().with_end_time(ts(1.0)))
            .unwrap();

        performance.clear_marks(Some("a"));
        assert_eq!(performance.get_entries_by_type(PerformanceEntryType::Mark).len(), 1);

        performance.clear_marks(None);
        assert!(performance.get_entries_by_type(PerformanceEntryType::Mark).is_empty());
        assert_eq!(performance.get_entries_by_type(PerformanceEntryType::Measure).len(), 1);

        performance.clear_measures(None);
        assert!(performance.get_entries().is_empty());
    }

    #[test]
    fn test_retrieval_restricted_to_marks_and_measures() {
        let (performance, _) = setup();
        performance.mark("shared", Some(ts(2.0)));
        performance
            .measure(
                "shared",
                MeasureOptions::new()
                    .with_start_time(ts(1.0))
                    .with_end_time(ts(3.0)),
            )
            .unwrap();
        performance
            .reporter()
            .report_long_task("shared", ts(0.0), HighResDuration::from_millis(70.0));

        let all = performance.get_entries();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].entry_type, PerformanceEntryType::Measure);
        assert_eq!(all[1].entry_type, PerformanceEntryType::Mark);

        assert_eq!(performance.get_entries_by_name("shared", None).len(), 2);
        assert_eq!(
            performance
                .get_entries_by_name("shared", Some(PerformanceEntryType::Mark))
                .len(),
            1
        );
        assert!(performance
            .get_entries_by_name("shared", Some(PerformanceEntryType::LongTask))
            .is_empty());
        assert!(performance.get_entries_by_type(PerformanceEntryType::LongTask).is_empty());
    }

    #[test]
    fn test_observer_dispatch_is_scheduled_once_per_cycle() {
        let (performance, scheduler) = setup();
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let handle = performance.create_observer(move || {
            *counter.lock().unwrap() += 1;
        });
        performance.observe(&handle, &ObserveRequest::single(PerformanceEntryType::Mark));

        for i in 0..5 {
            performance.mark(&format!("m{}", i), Some(ts(i as f64)));
        }
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(*calls.lock().unwrap(), 0);

        scheduler.run_all();
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(performance.take_records(&handle, true).len(), 5);

        performance.mark("again", None);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_disconnect_before_dispatch_runs() {
        let (performance, scheduler) = setup();
        let handle = performance.create_observer(|| {});
        performance.observe(&handle, &ObserveRequest::single(PerformanceEntryType::Mark));
        performance.mark("a", None);

        performance.disconnect(&handle);
        performance.disconnect(&handle);
        scheduler.run_all();

        assert!(performance.take_records(&handle, false).is_empty());
        assert_eq!(performance.get_dropped_entries_count(&handle), 0);
    }

    #[test]
    fn test_detached_handle_is_a_no_op() {
        let (performance, _) = setup();
        let handle = ObserverHandle::detached();

        performance.observe(&handle, &ObserveRequest::single(PerformanceEntryType::Mark));
        performance.disconnect(&handle);
        assert!(performance.take_records(&handle, true).is_empty());
        assert_eq!(performance.get_dropped_entries_count(&handle), 0);
    }

    #[test]
    fn test_buffered_observe_sees_existing_marks() {
        let (performance, scheduler) = setup();
        performance.mark("a", Some(ts(1.0)));
        performance.mark("b", Some(ts(2.0)));

        let buffered = performance.create_observer(|| {});
        performance.observe(
            &buffered,
            &ObserveRequest::single(PerformanceEntryType::Mark).with_buffered(true),
        );
        let unbuffered = performance.create_observer(|| {});
        performance.observe(&unbuffered, &ObserveRequest::single(PerformanceEntryType::Mark));

        assert_eq!(scheduler.pending(), 1);
        assert_eq!(performance.take_records(&buffered, true).len(), 2);
        assert!(performance.take_records(&unbuffered, true).is_empty());
    }

    #[test]
    fn test_observer_dropped_entries() {
        let scheduler = Arc::new(ManualScheduler::default());
        let reporter = Arc::new(PerformanceEntryReporter::new(ReporterConfig::default()));
        let performance = Performance::new(reporter, scheduler)
            .with_observer_config(ObserverConfig::default().with_max_buffer_size(1));

        let handle = performance.create_observer(|| {});
        performance.observe(&handle, &ObserveRequest::multiple([PerformanceEntryType::Event]));
        for _ in 0..3 {
            performance
                .reporter()
                .report_event("tap", ts(0.0), HighResDuration::ZERO, ts(0.0), ts(0.0), 1);
        }

        assert_eq!(performance.get_dropped_entries_count(&handle), 2);
        assert_eq!(performance.get_event_counts(), vec![("tap".to_string(), 3)]);

        performance.clear_event_counts_for_testing();
        assert!(performance.get_event_counts().is_empty());
    }

    #[test]
    fn test_startup_timing_and_supported_types() {
        let (performance, _) = setup();
        assert!(performance.get_startup_timing().is_empty());

        let startup = Arc::new(StartupLogger::new());
        startup.log(StartupMilestone::AppStartupStart, ts(0.5));
        let performance = performance.with_startup_logger(startup);
        assert_eq!(performance.get_startup_timing().get("startTime"), Some(&0.5));

        assert_eq!(
            performance.get_supported_entry_types(),
            PerformanceEntryType::ALL.to_vec()
        );
    }
}
