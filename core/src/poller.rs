use std::rc::Rc;

use crate::config::LiveLocationConfig;
use crate::scheduler::{Scheduler, TaskHandle};

const ACCURACY_REFERENCE_M: f64 = 500.0;
const ACCURACY_BASE_ZOOM: f64 = 16.0;
const ACCURACY_ZOOM_OFFSET: f64 = 3.0;
const MIN_ACCURACY_M: f64 = 1.0;

/// Zoom for a fix of the given accuracy: one level out per doubling of the
/// uncertainty radius, anchored at 500 m.
pub fn zoom_for_accuracy(accuracy_m: f64) -> f64 {
    let accuracy = if accuracy_m.is_finite() {
        accuracy_m.max(MIN_ACCURACY_M)
    } else {
        ACCURACY_REFERENCE_M
    };
    ACCURACY_BASE_ZOOM - (accuracy / ACCURACY_REFERENCE_M).log2() - ACCURACY_ZOOM_OFFSET
}

pub struct LocationPoller {
    period_ms: u32,
    _interval: TaskHandle,
}

impl LocationPoller {
    pub fn should_arm(live: &LiveLocationConfig) -> bool {
        live.polls()
    }

    pub fn arm(scheduler: &dyn Scheduler, period_ms: u32, tick: Rc<dyn Fn()>) -> Self {
        let interval = scheduler.interval(period_ms, Box::new(move || tick()));
        Self {
            period_ms,
            _interval: interval,
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }
}
