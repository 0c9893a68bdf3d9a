/// A struct that triggers an event periodically at a given interval.
#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    interval: f64,
    next_trigger: f64,
}

impl IntervalTrigger {
    /// Creates a new `IntervalTrigger` firing first at time zero.
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            next_trigger: 0.0,
        }
    }

    /// Restarts the cadence so that the next trigger happens at `time`.
    pub fn reset(&mut self, time: f64) {
        self.next_trigger = time;
    }

    /// Returns true if the event should be triggered at the given time.
    /// Missed intervals are skipped rather than fired in a burst.
    pub fn trigger(&mut self, time: f64) -> bool {
        if time >= self.next_trigger {
            self.next_trigger += self.interval;
            if self.next_trigger <= time {
                self.next_trigger = time + self.interval;
            }
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_trigger() {
        let mut trigger = IntervalTrigger::new(1.0);
        assert!(trigger.trigger(0.0));
        assert!(!trigger.trigger(0.5));
        assert!(trigger.trigger(1.0));
        assert!(!trigger.trigger(1.5));
        // long gap fires once
        assert!(trigger.trigger(10.0));
        assert!(!trigger.trigger(10.5));
        assert!(trigger.trigger(11.0));
    }

    #[test]
    fn test_reset() {
        let mut trigger = IntervalTrigger::new(3.0);
        assert!(trigger.trigger(0.0));
        trigger.reset(1.0);
        assert!(!trigger.trigger(0.9));
        assert!(trigger.trigger(1.0));
    }
}
