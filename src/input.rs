use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Scale applied to the pointer offset before it steers the cameras.
pub const POINTER_SCALE: f32 = 0.0001;

/// Pointer sample taken once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerSnapshot {
    /// Cursor position minus the window centre, in pixels.
    pub offset: Vec2,
    /// Cursor in normalized device coordinates, `+y` up.
    pub ndc: Vec2,
}

impl PointerSnapshot {
    /// Easing target for the camera sway: `(1 - offset) * 0.0001` per axis.
    pub fn target(&self) -> Vec2 {
        (Vec2::ONE - self.offset) * POINTER_SCALE
    }
}

/// Thread-safe pointer state shared between the event handlers and the frame loop.
#[derive(Debug, Default)]
pub struct PointerState {
    position: RwLock<Vec2>,
    viewport: RwLock<Vec2>,
    clicks: RwLock<Vec<Vec2>>,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_viewport(&self, width: f32, height: f32) {
        *self.viewport.write() = Vec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn set_position(&self, position: Vec2) {
        *self.position.write() = position;
    }

    pub fn position(&self) -> Vec2 {
        *self.position.read()
    }

    /// Queues a click at the current pointer position.
    pub fn click(&self) {
        let ndc = self.snapshot().ndc;
        self.clicks.write().push(ndc);
    }

    /// Clicks in normalized device coordinates since the last call.
    pub fn take_clicks(&self) -> Vec<Vec2> {
        std::mem::take(&mut *self.clicks.write())
    }

    pub fn snapshot(&self) -> PointerSnapshot {
        let position = self.position();
        let viewport = *self.viewport.read();
        if viewport == Vec2::ZERO {
            return PointerSnapshot {
                offset: position,
                ndc: Vec2::ZERO,
            };
        }
        let half = viewport / 2.0;
        let offset = position - half;
        PointerSnapshot {
            offset,
            ndc: Vec2::new(offset.x / half.x, -offset.y / half.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_relative_to_centre() {
        let state = PointerState::new();
        state.set_viewport(800.0, 600.0);
        state.set_position(Vec2::new(600.0, 150.0));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.offset, Vec2::new(200.0, -150.0));
        assert_eq!(snapshot.ndc, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn target_follows_sway_formula() {
        let snapshot = PointerSnapshot {
            offset: Vec2::new(101.0, -9.0),
            ndc: Vec2::ZERO,
        };
        let target = snapshot.target();
        assert!((target.x - -0.01).abs() < 1e-6);
        assert!((target.y - 0.001).abs() < 1e-6);
    }

    #[test]
    fn clicks_are_drained() {
        let state = PointerState::new();
        state.set_viewport(100.0, 100.0);
        state.set_position(Vec2::new(50.0, 50.0));
        state.click();
        assert_eq!(state.take_clicks(), vec![Vec2::ZERO]);
        assert!(state.take_clicks().is_empty());
    }
}
