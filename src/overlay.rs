//! Loader overlay shown while the page's assets download.

use crate::assets::LoadEvent;
use crate::timeline::{stagger_delays, timed_progress, Ease};

pub const LOADING_Z_INDEX: i32 = 99_999;
pub const HIDDEN_Z_INDEX: i32 = -1;

const COUNTER_DELAY: f32 = 1.0;
const COUNTER_DURATION: f32 = 0.3;
const BAR_DELAY: f32 = 0.5;
const BAR_DURATION: f32 = 1.5;
const BAR_STAGGER: f32 = 0.5;
const HIDE_DELAY: f32 = 3.0;

/// What the DOM overlay should show at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub percent: u32,
    pub counter_opacity: f32,
    /// Height of each `.loader__bar` as a fraction of its initial height.
    pub bar_heights: Vec<f32>,
    pub z_index: i32,
}

#[derive(Debug, Clone)]
pub struct LoaderOverlay {
    percent: u32,
    bar_delays: Vec<f32>,
    completed_at: Option<f32>,
}

impl LoaderOverlay {
    pub fn new(bars: usize) -> Self {
        Self {
            percent: 0,
            bar_delays: stagger_delays(bars, BAR_STAGGER),
            completed_at: None,
        }
    }

    pub fn percent(&self) -> u32 {
        self.percent
    }

    /// Folds loader events into the overlay; completion starts the exit animation at `now`.
    pub fn apply(&mut self, events: &[LoadEvent], now: f32) {
        for event in events {
            match event {
                LoadEvent::Started { .. } => {
                    if self.completed_at.take().is_some() {
                        log::debug!("loading restarted, showing loader again");
                    }
                }
                LoadEvent::Progress { loaded, total, .. } => {
                    self.percent = if *total == 0 {
                        100
                    } else {
                        (*loaded as f32 / *total as f32 * 100.0).round() as u32
                    };
                }
                LoadEvent::Failed { .. } => {}
                LoadEvent::Completed => self.complete(now),
            }
        }
    }

    pub fn complete(&mut self, now: f32) {
        if self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    pub fn frame(&self, now: f32) -> OverlayFrame {
        let Some(done) = self.completed_at else {
            return OverlayFrame {
                percent: self.percent,
                counter_opacity: 1.0,
                bar_heights: vec![1.0; self.bar_delays.len()],
                z_index: LOADING_Z_INDEX,
            };
        };
        let elapsed = now - done;
        let fade = Ease::PowerOut(1).apply(timed_progress(elapsed, COUNTER_DELAY, COUNTER_DURATION));
        let collapse = Ease::PowerInOut(4);
        let bar_heights = self
            .bar_delays
            .iter()
            .map(|stagger| {
                1.0 - collapse.apply(timed_progress(elapsed, BAR_DELAY + stagger, BAR_DURATION))
            })
            .collect();
        OverlayFrame {
            percent: self.percent,
            counter_opacity: 1.0 - fade,
            bar_heights,
            z_index: if elapsed >= HIDE_DELAY {
                HIDDEN_Z_INDEX
            } else {
                LOADING_Z_INDEX
            },
        }
    }

    /// True once the overlay no longer changes.
    pub fn is_finished(&self, now: f32) -> bool {
        self.completed_at.is_some_and(|done| {
            let last_bar = self.bar_delays.last().copied().unwrap_or(0.0);
            now - done >= HIDE_DELAY.max(BAR_DELAY + last_bar + BAR_DURATION)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(loaded: usize, total: usize) -> LoadEvent {
        LoadEvent::Progress {
            url: "objects/face/face.obj".into(),
            loaded,
            total,
        }
    }

    #[test]
    fn shows_rounded_percent_while_loading() {
        let mut overlay = LoaderOverlay::new(4);
        overlay.apply(&[progress(1, 3)], 0.0);
        let frame = overlay.frame(10.0);
        assert_eq!(frame.percent, 33);
        assert_eq!(frame.counter_opacity, 1.0);
        assert_eq!(frame.z_index, LOADING_Z_INDEX);
        assert_eq!(frame.bar_heights, vec![1.0; 4]);
    }

    #[test]
    fn exit_animation_follows_schedule() {
        let mut overlay = LoaderOverlay::new(3);
        overlay.apply(&[progress(3, 3), LoadEvent::Completed], 2.0);

        let early = overlay.frame(2.4);
        assert_eq!(early.counter_opacity, 1.0);
        assert_eq!(early.bar_heights, vec![1.0; 3]);

        // first bar is halfway through its collapse, later bars trail behind
        let mid = overlay.frame(2.0 + 0.5 + 0.75);
        assert!((mid.bar_heights[0] - 0.5).abs() < 1e-5);
        assert!(mid.bar_heights[0] < mid.bar_heights[1]);
        assert!(mid.bar_heights[1] < mid.bar_heights[2]);
        assert!(mid.bar_heights[2] < 1.0);
        assert!(mid.counter_opacity < 1.0);

        let end = overlay.frame(5.0);
        assert_eq!(end.counter_opacity, 0.0);
        assert!(end.bar_heights.iter().all(|h| *h == 0.0));
        assert_eq!(end.z_index, HIDDEN_Z_INDEX);
        assert!(overlay.is_finished(5.0));
        assert!(!overlay.is_finished(4.0));
    }
}
