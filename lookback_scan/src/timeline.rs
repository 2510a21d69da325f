use std::time::{Duration, Instant};

/// Labelled wall-clock segments. Each stamp closes the previous segment and
/// opens a new one under the given label.
#[derive(Debug, Default)]
pub struct Timeline {
    open: Option<(String, Instant)>,
    segments: Vec<(String, Duration)>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamp(&mut self, label: &str) {
        let now = Instant::now();
        self.close(now);
        self.open = Some((label.to_string(), now));
    }

    pub fn finish(&mut self) {
        self.close(Instant::now());
    }

    fn close(&mut self, now: Instant) {
        if let Some((label, start)) = self.open.take() {
            self.segments.push((label, now - start));
        }
    }

    pub fn segments(&self) -> &[(String, Duration)] {
        &self.segments
    }

    pub fn print(&self) {
        for (label, elapsed) in self.segments() {
            println!("{}:\t{:.2?}", label, elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_close_previous_segment() {
        let mut timeline = Timeline::new();
        timeline.stamp("device");
        timeline.stamp("host");
        timeline.finish();
        let labels: Vec<&str> = timeline.segments().iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["device", "host"]);
    }

    #[test]
    fn finish_without_stamp_records_nothing() {
        let mut timeline = Timeline::new();
        timeline.finish();
        assert!(timeline.segments().is_empty());
    }
}
