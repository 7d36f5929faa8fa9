use super::detection::DetectionEvent;
use std::collections::BTreeSet;

/// 由時間相近的偵測事件組成的時間區段
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub start: f64,
    pub end: f64,
    /// 所有成員事件標籤的聯集
    pub labels: BTreeSet<String>,
}

impl Scene {
    fn open(event: &DetectionEvent) -> Self {
        Self {
            start: event.timestamp,
            end: event.timestamp,
            labels: event.labels.clone(),
        }
    }

    fn extend(&mut self, event: &DetectionEvent) {
        self.end = event.timestamp;
        self.labels.extend(event.labels.iter().cloned());
    }

    /// 加上前後延伸秒數後的輸出區間，起點不小於 0
    #[must_use]
    pub fn padded_window(&self, pre: f64, post: f64) -> (f64, f64) {
        ((self.start - pre).max(0.0), self.end + post)
    }
}

/// 依最大間隔將已排序的偵測事件分組
///
/// 與前一個事件的間隔等於 `cluster_gap` 時仍屬同一場景。
#[must_use]
pub fn segment_scenes(events: &[DetectionEvent], cluster_gap: f64) -> Vec<Scene> {
    let mut scenes: Vec<Scene> = Vec::new();

    for event in events {
        match scenes.last_mut() {
            Some(current) if event.timestamp - current.end <= cluster_gap => current.extend(event),
            _ => scenes.push(Scene::open(event)),
        }
    }

    scenes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(timestamp: f64, labels: &[&str]) -> DetectionEvent {
        DetectionEvent {
            timestamp,
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    fn events_at(times: &[f64]) -> Vec<DetectionEvent> {
        times.iter().map(|&t| event(t, &["person"])).collect()
    }

    #[test]
    fn test_no_events_no_scenes() {
        assert!(segment_scenes(&[], 5.0).is_empty());
    }

    #[test]
    fn test_gap_boundary() {
        let events = events_at(&[0.0, 3.0, 8.0]);

        let scenes = segment_scenes(&events, 5.0);
        assert_eq!(scenes.len(), 1);
        assert!((scenes[0].start - 0.0).abs() < f64::EPSILON);
        assert!((scenes[0].end - 8.0).abs() < f64::EPSILON);

        let scenes = segment_scenes(&events, 4.0);
        assert_eq!(scenes.len(), 2);
        assert!((scenes[0].end - 3.0).abs() < f64::EPSILON);
        assert!((scenes[1].start - 8.0).abs() < f64::EPSILON);
        assert!((scenes[1].end - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gap_measured_from_last_event() {
        // 0 → 4 → 8 → 12 每段間隔都 ≤ 5，整段合併
        let scenes = segment_scenes(&events_at(&[0.0, 4.0, 8.0, 12.0]), 5.0);
        assert_eq!(scenes.len(), 1);
        assert!((scenes[0].end - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scenes_partition_events() {
        let times = [0.5, 1.0, 1.5, 9.0, 9.2, 30.0, 31.0, 45.0];
        let events = events_at(&times);
        let scenes = segment_scenes(&events, 2.0);

        // 每個事件恰好落在一個場景內，場景依時間排序且不重疊
        for e in &events {
            let count = scenes
                .iter()
                .filter(|s| s.start <= e.timestamp && e.timestamp <= s.end)
                .count();
            assert_eq!(count, 1, "事件 {} 應只屬於一個場景", e.timestamp);
        }
        for pair in scenes.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        assert_eq!(scenes.len(), 4);
    }

    #[test]
    fn test_scene_labels_are_union() {
        let events = vec![
            event(1.0, &["person"]),
            event(2.0, &["dog"]),
            event(3.0, &["person", "car"]),
        ];
        let scenes = segment_scenes(&events, 5.0);
        assert_eq!(scenes.len(), 1);
        assert_eq!(
            scenes[0].labels.iter().cloned().collect::<Vec<_>>(),
            vec!["car", "dog", "person"]
        );
    }

    #[test]
    fn test_padded_window_clamps_to_zero() {
        let scenes = segment_scenes(&events_at(&[1.0, 2.0, 3.0]), 5.0);
        assert_eq!(scenes[0].padded_window(1.0, 2.0), (0.0, 5.0));
        assert_eq!(scenes[0].padded_window(3.0, 3.0), (0.0, 6.0));
    }
}
