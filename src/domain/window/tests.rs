// Unit tests for detection windows

#[cfg(test)]
mod tests {
    use crate::domain::model::*;
    use crate::domain::window::*;
    use std::collections::BTreeMap;

    const EPSILON: f64 = 1e-6;

    fn settings(check_interval: u64, grace_period: u64) -> TrackerSettings {
        TrackerSettings::new(check_interval, grace_period, 0.5).unwrap()
    }

    fn present(class_id: ClassId, confidence: f32) -> BTreeMap<ClassId, f32> {
        let mut samples = BTreeMap::new();
        samples.insert(class_id, confidence);
        samples
    }

    fn absent() -> BTreeMap<ClassId, f32> {
        BTreeMap::new()
    }

    #[test]
    fn test_settings_validation() {
        assert!(TrackerSettings::new(0, 2, 0.5).is_err());
        assert!(TrackerSettings::new(5, 0, 0.5).is_err());
        assert!(TrackerSettings::new(5, 2, 1.5).is_err());
        assert!(TrackerSettings::new(5, 2, -0.1).is_err());

        let settings = TrackerSettings::new(5, 2, 0.5).unwrap();
        assert_eq!(settings.grace_budget(), 10);
        assert!(settings.is_sampled(10));
        assert!(!settings.is_sampled(11));
    }

    #[test]
    fn test_detection_percentage_with_gaps() {
        let closed = ClosedWindow {
            class_id: 0,
            marks: vec![
                Mark::Detected(0),
                Mark::Absent,
                Mark::Detected(10),
                Mark::Absent,
                Mark::Detected(20),
            ],
            confidences: vec![],
            closed_at: 30,
        };
        assert_eq!(closed.detections(), 3);
        assert!((closed.detection_percentage() - 0.6).abs() < EPSILON);
        assert_eq!(closed.last_valid_frame(), 20);
    }

    #[test]
    fn test_last_valid_frame_falls_back_to_close() {
        let closed = ClosedWindow {
            class_id: 0,
            marks: vec![Mark::Absent],
            confidences: vec![],
            closed_at: 42,
        };
        assert_eq!(closed.last_valid_frame(), 42);
        assert_eq!(closed.detection_percentage(), 0.0);
    }

    #[test]
    fn test_empty_window_percentage_is_zero() {
        let closed = ClosedWindow {
            class_id: 0,
            marks: vec![],
            confidences: vec![],
            closed_at: 0,
        };
        assert_eq!(closed.detection_percentage(), 0.0);
    }

    #[test]
    fn test_confidence_stats() {
        let stats = ConfidenceStats::from_samples(&[0.4, 0.9, 0.5]);
        assert!((stats.mean - 0.6).abs() < EPSILON);
        assert!((stats.median - 0.5).abs() < EPSILON);
        assert!((stats.peak - 0.9).abs() < EPSILON);

        let even = ConfidenceStats::from_samples(&[0.2, 0.8, 0.4, 0.6]);
        assert!((even.median - 0.5).abs() < EPSILON);

        let empty = ConfidenceStats::from_samples(&[]);
        assert_eq!(empty, ConfidenceStats { mean: 0.0, median: 0.0, peak: 0.0 });
    }

    #[test]
    fn test_cat_scenario_closes_when_grace_exhausted() {
        let mut tracker = WindowTracker::new(settings(5, 2));

        assert!(tracker.observe(0, true, &present(15, 0.4)).is_empty());
        assert!(tracker.observe(5, true, &present(15, 0.9)).is_empty());
        assert!(tracker.observe(10, true, &present(15, 0.5)).is_empty());
        assert!(tracker.observe(15, true, &absent()).is_empty());
        assert!(tracker.is_active(15));

        let closed = tracker.observe(20, true, &absent());
        assert_eq!(closed.len(), 1);
        let window = &closed[0];
        assert_eq!(window.class_id, 15);
        assert_eq!(window.len(), 5);
        assert!((window.detection_percentage() - 0.6).abs() < EPSILON);
        assert_eq!(window.last_valid_frame(), 10);
        assert_eq!(window.closed_at, 20);
        assert!(!tracker.is_active(15));
    }

    #[test]
    fn test_gap_shorter_than_grace_keeps_window_open() {
        let mut tracker = WindowTracker::new(settings(1, 3));

        tracker.observe(0, true, &present(1, 0.9));
        assert!(tracker.observe(1, true, &absent()).is_empty());
        assert!(tracker.observe(2, true, &absent()).is_empty());
        assert!(tracker.observe(3, true, &present(1, 0.9)).is_empty());
        assert!(tracker.is_active(1));

        let window = tracker.window(1).unwrap();
        assert_eq!(window.marks().len(), 4);
        assert_eq!(window.grace_remaining(), 3);
    }

    #[test]
    fn test_gap_equal_to_grace_closes_on_last_tick() {
        let mut tracker = WindowTracker::new(settings(1, 3));

        tracker.observe(0, true, &present(1, 0.9));
        assert!(tracker.observe(1, true, &absent()).is_empty());
        assert!(tracker.observe(2, true, &absent()).is_empty());
        let closed = tracker.observe(3, true, &absent());
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].marks.len(), 4);
    }

    #[test]
    fn test_non_sampled_ticks_do_not_change_windows() {
        let mut tracker = WindowTracker::new(settings(5, 1));

        tracker.observe(0, true, &present(2, 0.7));
        for index in 1..5 {
            assert!(tracker.observe(index, false, &absent()).is_empty());
        }
        let window = tracker.window(2).unwrap();
        assert_eq!(window.marks().len(), 1);
        assert_eq!(window.grace_remaining(), 5);
        assert!(window.is_active());
    }

    #[test]
    fn test_saved_flag_uses_threshold() {
        let closed = ClosedWindow {
            class_id: 0,
            marks: vec![Mark::Detected(0), Mark::Absent],
            confidences: vec![0.9],
            closed_at: 5,
        };
        assert!(closed.is_saved(0.5));
        assert!(!closed.is_saved(0.51));
    }

    #[test]
    fn test_close_all_closes_each_window_once() {
        let mut tracker = WindowTracker::new(settings(1, 5));

        let mut samples = BTreeMap::new();
        samples.insert(0, 0.8);
        samples.insert(3, 0.6);
        tracker.observe(0, true, &samples);

        let closed = tracker.close_all(1);
        assert_eq!(closed.len(), 2);
        assert!(tracker.active_classes().is_empty());
        assert!(tracker.close_all(2).is_empty());
    }

    #[test]
    fn test_window_reopens_after_close_with_fresh_state() {
        let mut tracker = WindowTracker::new(settings(1, 1));

        tracker.observe(0, true, &present(4, 0.3));
        let first = tracker.observe(1, true, &absent());
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].confidences, vec![0.3]);

        // An absent tick on a closed window leaves no mark
        assert!(tracker.observe(2, true, &absent()).is_empty());
        assert!(tracker.window(4).unwrap().marks().is_empty());

        tracker.observe(3, true, &present(4, 0.8));
        let window = tracker.window(4).unwrap();
        assert_eq!(window.marks(), &[Mark::Detected(3)]);
        assert_eq!(window.confidences(), &[0.8]);
    }

    #[test]
    fn test_summary_from_closed_window() {
        let video = VideoInfo::new(640, 480, 30.0, 900).unwrap();
        let closed = ClosedWindow {
            class_id: 15,
            marks: vec![
                Mark::Detected(0),
                Mark::Detected(5),
                Mark::Detected(10),
                Mark::Absent,
                Mark::Absent,
            ],
            confidences: vec![0.4, 0.9, 0.5],
            closed_at: 20,
        };

        let summary = WindowSummary::from_closed(&closed, "cat", &video, 0.5, 20);
        assert_eq!(summary.class_name, "cat");
        assert!((summary.timestamp_secs - 10.0 / 30.0).abs() < EPSILON);
        assert_eq!(summary.frame_count, 3);
        assert_eq!(summary.window_length, 5);
        assert!(summary.saved);
        assert_eq!(summary.buffered_frames, 20);
    }
}
