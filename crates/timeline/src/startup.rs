//! Application startup milestones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::entry::HighResTimeStamp;

/// Global startup logger instance
static GLOBAL_STARTUP_LOGGER: OnceLock<Arc<StartupLogger>> = OnceLock::new();

/// A startup milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartupMilestone {
    AppStartupStart,
    AppStartupEnd,
    InitRuntimeStart,
    InitRuntimeEnd,
    RunBundleStart,
    RunBundleEnd,
}

#[derive(Debug, Default)]
struct Milestones {
    app_startup_start: Option<HighResTimeStamp>,
    app_startup_end: Option<HighResTimeStamp>,
    init_runtime_start: Option<HighResTimeStamp>,
    init_runtime_end: Option<HighResTimeStamp>,
    run_bundle_start: Option<HighResTimeStamp>,
    run_bundle_end: Option<HighResTimeStamp>,
}

impl Milestones {
    fn slot(&mut self, milestone: StartupMilestone) -> &mut Option<HighResTimeStamp> {
        match milestone {
            StartupMilestone::AppStartupStart => &mut self.app_startup_start,
            StartupMilestone::AppStartupEnd => &mut self.app_startup_end,
            StartupMilestone::InitRuntimeStart => &mut self.init_runtime_start,
            StartupMilestone::InitRuntimeEnd => &mut self.init_runtime_end,
            StartupMilestone::RunBundleStart => &mut self.run_bundle_start,
            StartupMilestone::RunBundleEnd => &mut self.run_bundle_end,
        }
    }
}

/// Records when the host application reached each startup milestone.
#[derive(Debug, Default)]
pub struct StartupLogger {
    milestones: Mutex<Milestones>,
}

impl StartupLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the process-wide startup logger.
    pub fn instance() -> &'static Arc<StartupLogger> {
        GLOBAL_STARTUP_LOGGER.get_or_init(|| Arc::new(StartupLogger::new()))
    }

    fn milestones(&self) -> MutexGuard<'_, Milestones> {
        self.milestones.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a milestone. Later calls overwrite earlier ones.
    pub fn log(&self, milestone: StartupMilestone, at: HighResTimeStamp) {
        *self.milestones().slot(milestone) = Some(at);
    }

    /// When a milestone was reached, if it has been.
    pub fn get(&self, milestone: StartupMilestone) -> Option<HighResTimeStamp> {
        *self.milestones().slot(milestone)
    }

    /// Forget every milestone.
    pub fn reset(&self) {
        *self.milestones() = Milestones::default();
    }

    /// Startup timing keyed the way the scripting API exposes it.
    ///
    /// `startTime` is the app startup start, or the runtime init start when
    /// the app start was never logged. Missing milestones are omitted.
    pub fn startup_timing(&self) -> HashMap<String, f64> {
        let m = self.milestones();
        let mut result = HashMap::new();

        if let Some(start) = m.app_startup_start.or(m.init_runtime_start) {
            result.insert("startTime".to_string(), start.as_millis());
        }

        let fields = [
            ("initializeRuntimeStart", m.init_runtime_start),
            ("executeJavaScriptBundleEntryPointStart", m.run_bundle_start),
            ("executeJavaScriptBundleEntryPointEnd", m.run_bundle_end),
            ("initializeRuntimeEnd", m.init_runtime_end),
            ("endTime", m.app_startup_end),
        ];
        for (key, value) in fields {
            if let Some(ts) = value {
                result.insert(key.to_string(), ts.as_millis());
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_timing() {
        let logger = StartupLogger::new();
        assert!(logger.startup_timing().is_empty());
    }

    #[test]
    fn test_start_time_falls_back_to_runtime_init() {
        let logger = StartupLogger::new();
        logger.log(StartupMilestone::InitRuntimeStart, HighResTimeStamp::from_millis(4.0));
        logger.log(StartupMilestone::InitRuntimeEnd, HighResTimeStamp::from_millis(9.0));

        let timing = logger.startup_timing();
        assert_eq!(timing.get("startTime"), Some(&4.0));
        assert_eq!(timing.get("initializeRuntimeStart"), Some(&4.0));
        assert_eq!(timing.get("initializeRuntimeEnd"), Some(&9.0));
        assert!(!timing.contains_key("endTime"));
    }

    #[test]
    fn test_app_start_takes_precedence() {
        let logger = StartupLogger::new();
        logger.log(StartupMilestone::InitRuntimeStart, HighResTimeStamp::from_millis(4.0));
        logger.log(StartupMilestone::AppStartupStart, HighResTimeStamp::from_millis(1.0));
        logger.log(StartupMilestone::AppStartupEnd, HighResTimeStamp::from_millis(30.0));

        let timing = logger.startup_timing();
        assert_eq!(timing.get("startTime"), Some(&1.0));
        assert_eq!(timing.get("endTime"), Some(&30.0));

        logger.reset();
        assert_eq!(logger.get(StartupMilestone::AppStartupStart), None);
    }
}
