//! Scroll- and clock-driven property animation.
//!
//! A tween maps the progress of a scroll range (or a wall-clock segment) onto
//! one or more animatable channels. From-values are captured when a tween is
//! declared, so consecutive tweens on the same channel chain end to start.

mod ease;
mod trigger;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::NodeId;

pub use ease::{stagger_delays, timed_progress, Ease};
pub use trigger::{
    range_progress, Edge, Placement, ScrollTrigger, SectionBounds, SectionLayout, SectionRef,
    StackedLayout,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriggerError {
    #[error("unknown placement edge `{0}`")]
    UnknownEdge(String),
    #[error("placement `{0}` must be `<element> <viewport>`")]
    InvalidPlacement(String),
    #[error("unknown ease `{0}`")]
    UnknownEase(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneId {
    Face,
    Squares,
    Landscape,
}

impl SceneId {
    pub const ALL: [SceneId; 3] = [SceneId::Face, SceneId::Squares, SceneId::Landscape];

    pub fn name(self) -> &'static str {
        match self {
            SceneId::Face => "face",
            SceneId::Squares => "squares",
            SceneId::Landscape => "landscape",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorComponent {
    Red,
    Green,
    Blue,
    Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    Node(SceneId, NodeId),
    Camera(SceneId),
    Backdrop(SceneId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    Position(Axis),
    Rotation(Axis),
    Scale(Axis),
    Color(ColorComponent),
}

/// A single animatable scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub target: Target,
    pub property: Property,
}

impl Channel {
    pub fn new(target: Target, property: Property) -> Self {
        Self { target, property }
    }
}

/// State that tweens can read from and write to.
pub trait Animatable {
    fn read(&self, channel: Channel) -> Option<f32>;
    /// Returns `false` when the channel does not exist.
    fn write(&mut self, channel: Channel, value: f32) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    channel: Channel,
    from: f32,
    to: f32,
}

impl Segment {
    fn value(&self, eased: f32) -> f32 {
        self.from + (self.to - self.from) * eased
    }
}

/// Declares tweens and captures their from-values.
#[derive(Debug, Default)]
struct SegmentBook {
    declared: HashMap<Channel, f32>,
}

impl SegmentBook {
    fn segments(&mut self, state: &dyn Animatable, targets: &[(Channel, f32)]) -> Vec<Segment> {
        targets
            .iter()
            .filter_map(|&(channel, to)| {
                let from = match self.declared.get(&channel) {
                    Some(previous) => *previous,
                    None => state.read(channel)?,
                };
                self.declared.insert(channel, to);
                Some(Segment { channel, from, to })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollTween {
    trigger: ScrollTrigger,
    ease: Ease,
    segments: Vec<Segment>,
    /// Progress written on the last update; zero until the tween first starts.
    applied: f32,
}

impl ScrollTween {
    pub fn trigger(&self) -> &ScrollTrigger {
        &self.trigger
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.segments.iter().map(|segment| segment.channel)
    }
}

/// Scrubbed tweens keyed to scroll ranges.
#[derive(Debug, Default)]
pub struct ScrollAnimator {
    book: SegmentBook,
    tweens: Vec<ScrollTween>,
    last_scroll: Option<f32>,
}

impl ScrollAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a tween toward `targets`; channels missing from `state` are skipped.
    pub fn to(
        &mut self,
        state: &dyn Animatable,
        targets: &[(Channel, f32)],
        trigger: ScrollTrigger,
        ease: Ease,
    ) -> &mut Self {
        let segments = self.book.segments(state, targets);
        if segments.is_empty() {
            log::debug!("dropping tween on {} with no live channels", trigger.trigger.selector());
        } else {
            self.tweens.push(ScrollTween {
                trigger,
                ease,
                segments,
                applied: 0.0,
            });
        }
        self
    }

    pub fn tweens(&self) -> &[ScrollTween] {
        &self.tweens
    }

    /// Forces the next `update` to re-apply every tween.
    pub fn invalidate(&mut self) {
        self.last_scroll = None;
    }

    /// Applies every started tween for `scroll`; returns `false` if nothing changed.
    ///
    /// Tweens scrolled back before their start restore their from-values,
    /// latest declaration first, so an earlier tween on the same channel
    /// still wins when it is active.
    pub fn update(
        &mut self,
        scroll: f32,
        layout: &dyn SectionLayout,
        state: &mut dyn Animatable,
    ) -> bool {
        if self.last_scroll == Some(scroll) {
            return false;
        }
        self.last_scroll = Some(scroll);
        let progress: Vec<Option<f32>> = self
            .tweens
            .iter()
            .map(|tween| tween.trigger.progress(scroll, layout))
            .collect();

        for (tween, progress) in self.tweens.iter_mut().zip(&progress).rev() {
            if *progress == Some(0.0) && tween.applied > 0.0 {
                for segment in &tween.segments {
                    state.write(segment.channel, segment.from);
                }
                tween.applied = 0.0;
            }
        }
        for (tween, progress) in self.tweens.iter_mut().zip(progress) {
            let Some(progress) = progress.filter(|progress| *progress > 0.0) else {
                continue;
            };
            let eased = tween.ease.apply(progress);
            for segment in &tween.segments {
                state.write(segment.channel, segment.value(eased));
            }
            tween.applied = progress;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ClockTween {
    start: f32,
    delay: f32,
    duration: f32,
    ease: Ease,
    segments: Vec<Segment>,
}

/// Time-based tweens that retire once finished.
#[derive(Debug, Default)]
pub struct ClockAnimator {
    tweens: Vec<ClockTween>,
}

impl ClockAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a tween at `now` from the channels' current values.
    pub fn start(
        &mut self,
        state: &dyn Animatable,
        targets: &[(Channel, f32)],
        now: f32,
        delay: f32,
        duration: f32,
        ease: Ease,
    ) {
        let segments: Vec<Segment> = targets
            .iter()
            .filter_map(|&(channel, to)| {
                state
                    .read(channel)
                    .map(|from| Segment { channel, from, to })
            })
            .collect();
        if segments.is_empty() {
            return;
        }
        self.tweens.push(ClockTween {
            start: now,
            delay,
            duration,
            ease,
            segments,
        });
    }

    pub fn is_animating(&self, channel: Channel) -> bool {
        self.tweens
            .iter()
            .any(|tween| tween.segments.iter().any(|s| s.channel == channel))
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn update(&mut self, now: f32, state: &mut dyn Animatable) {
        self.tweens.retain(|tween| {
            let progress = timed_progress(now - tween.start, tween.delay, tween.duration);
            if now - tween.start >= tween.delay {
                let eased = tween.ease.apply(progress);
                for segment in &tween.segments {
                    state.write(segment.channel, segment.value(eased));
                }
            }
            progress < 1.0
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Values(HashMap<Channel, f32>);

    impl Animatable for Values {
        fn read(&self, channel: Channel) -> Option<f32> {
            self.0.get(&channel).copied()
        }

        fn write(&mut self, channel: Channel, value: f32) -> bool {
            match self.0.get_mut(&channel) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        }
    }

    fn camera_x() -> Channel {
        Channel::new(Target::Camera(SceneId::Squares), Property::Position(Axis::X))
    }

    fn layout() -> StackedLayout {
        StackedLayout::new(100.0).with_container("squares-section", 10)
    }

    fn between(a: u32, b: u32) -> ScrollTrigger {
        ScrollTrigger::between(
            SectionRef::new("squares-section", a),
            SectionRef::new("squares-section", b),
        )
    }

    #[test]
    fn chained_tweens_start_from_previous_target() {
        let mut values = Values::default();
        values.0.insert(camera_x(), -3.0);
        let mut animator = ScrollAnimator::new();
        animator
            .to(&values, &[(camera_x(), -3.0)], between(2, 3), Ease::Linear)
            .to(&values, &[(camera_x(), 3.0)], between(4, 5), Ease::Linear);

        // ranges: n_2 -> n_3 is 0..100, n_4 -> n_5 is 200..300
        animator.update(250.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(0.0));
        animator.update(1000.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(3.0));
    }

    #[test]
    fn scrolling_back_restores_start_values() {
        let mut values = Values::default();
        values.0.insert(camera_x(), 5.0);
        let mut animator = ScrollAnimator::new();
        animator.to(&values, &[(camera_x(), 9.0)], between(2, 3), Ease::Linear);

        animator.update(1000.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(9.0));
        animator.update(0.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(5.0));
    }

    #[test]
    fn scrolling_back_between_chained_tweens_keeps_earlier_target() {
        let mut values = Values::default();
        values.0.insert(camera_x(), 0.0);
        let mut animator = ScrollAnimator::new();
        animator
            .to(&values, &[(camera_x(), -3.0)], between(2, 3), Ease::Linear)
            .to(&values, &[(camera_x(), 3.0)], between(4, 5), Ease::Linear);

        animator.update(1000.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(3.0));
        // past n_3 but before n_4: only the first tween has run
        animator.update(150.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(-3.0));
        animator.update(50.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(-1.5));
        animator.update(0.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(0.0));
    }

    #[test]
    fn unstarted_tweens_leave_values_alone() {
        let mut values = Values::default();
        values.0.insert(camera_x(), 7.0);
        let mut animator = ScrollAnimator::new();
        animator.to(&values, &[(camera_x(), 0.0)], between(4, 5), Ease::Linear);
        animator.update(100.0, &layout(), &mut values);
        assert_eq!(values.read(camera_x()), Some(7.0));
    }

    #[test]
    fn repeated_scroll_offset_is_ignored() {
        let mut values = Values::default();
        values.0.insert(camera_x(), 0.0);
        let mut animator = ScrollAnimator::new();
        animator.to(&values, &[(camera_x(), 10.0)], between(1, 3), Ease::Linear);
        assert!(animator.update(1000.0, &layout(), &mut values));
        values.write(camera_x(), 42.0);
        assert!(!animator.update(1000.0, &layout(), &mut values));
        assert_eq!(values.read(camera_x()), Some(42.0));
        animator.invalidate();
        assert!(animator.update(1000.0, &layout(), &mut values));
        assert_eq!(values.read(camera_x()), Some(10.0));
    }

    #[test]
    fn missing_channels_are_dropped() {
        let values = Values::default();
        let mut animator = ScrollAnimator::new();
        animator.to(&values, &[(camera_x(), 1.0)], between(1, 2), Ease::Linear);
        assert!(animator.tweens().is_empty());
    }

    #[test]
    fn clock_tween_finishes_and_retires() {
        let mut values = Values::default();
        values.0.insert(camera_x(), 1.0);
        let mut clock = ClockAnimator::new();
        clock.start(&values, &[(camera_x(), 3.0)], 10.0, 0.0, 1.0, Ease::Linear);
        assert!(clock.is_animating(camera_x()));
        clock.update(10.5, &mut values);
        assert_eq!(values.read(camera_x()), Some(2.0));
        clock.update(11.5, &mut values);
        assert_eq!(values.read(camera_x()), Some(3.0));
        assert!(clock.is_empty());
    }
}
