use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TriggerError;

/// One `.section.n_<index>` element inside a scene's section container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionRef {
    pub container: String,
    pub index: u32,
}

impl SectionRef {
    pub fn new(container: impl Into<String>, index: u32) -> Self {
        Self {
            container: container.into(),
            index,
        }
    }

    pub fn selector(&self) -> String {
        format!("#{} .section.n_{}", self.container, self.index)
    }
}

/// Vertical extent of a section in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionBounds {
    pub top: f32,
    pub height: f32,
}

/// Supplies section geometry for resolving scroll triggers.
pub trait SectionLayout {
    fn section_bounds(&self, section: &SectionRef) -> Option<SectionBounds>;
    fn viewport_height(&self) -> f32;
}

/// Offset along an element or the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Edge {
    /// Fraction of the extent, `0.0` is the top edge.
    Fraction(f32),
    Pixels(f32),
}

impl Edge {
    pub fn resolve(self, extent: f32) -> f32 {
        match self {
            Edge::Fraction(fraction) => fraction * extent,
            Edge::Pixels(pixels) => pixels,
        }
    }
}

impl FromStr for Edge {
    type Err = TriggerError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let parsed = match token {
            "top" => Some(Edge::Fraction(0.0)),
            "center" => Some(Edge::Fraction(0.5)),
            "bottom" => Some(Edge::Fraction(1.0)),
            _ => {
                if let Some(percent) = token.strip_suffix('%') {
                    percent.parse::<f32>().ok().map(|p| Edge::Fraction(p / 100.0))
                } else {
                    token
                        .strip_suffix("px")
                        .unwrap_or(token)
                        .parse::<f32>()
                        .ok()
                        .map(Edge::Pixels)
                }
            }
        };
        parsed.ok_or_else(|| TriggerError::UnknownEdge(token.to_string()))
    }
}

/// `"<element-edge> <viewport-edge>"`: the scroll offset where the two meet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub element: Edge,
    pub viewport: Edge,
}

impl Placement {
    pub const TOP_BOTTOM: Self = Self {
        element: Edge::Fraction(0.0),
        viewport: Edge::Fraction(1.0),
    };

    pub fn offset(&self, bounds: SectionBounds, viewport_height: f32) -> f32 {
        bounds.top + self.element.resolve(bounds.height) - self.viewport.resolve(viewport_height)
    }
}

impl FromStr for Placement {
    type Err = TriggerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut tokens = value.split_whitespace();
        let element = tokens
            .next()
            .ok_or_else(|| TriggerError::InvalidPlacement(value.to_string()))?
            .parse()?;
        let viewport = match tokens.next() {
            Some(token) => token.parse()?,
            None => Edge::Fraction(0.0),
        };
        if tokens.next().is_some() {
            return Err(TriggerError::InvalidPlacement(value.to_string()));
        }
        Ok(Self { element, viewport })
    }
}

/// Scroll range between `trigger` meeting `start` and `end_trigger` meeting `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollTrigger {
    pub trigger: SectionRef,
    pub end_trigger: SectionRef,
    pub start: Placement,
    pub end: Placement,
}

impl ScrollTrigger {
    pub fn between(trigger: SectionRef, end_trigger: SectionRef) -> Self {
        Self {
            trigger,
            end_trigger,
            start: Placement::TOP_BOTTOM,
            end: Placement::TOP_BOTTOM,
        }
    }

    pub fn with_start(mut self, start: Placement) -> Self {
        self.start = start;
        self
    }

    pub fn with_end(mut self, end: Placement) -> Self {
        self.end = end;
        self
    }

    /// Start and end scroll offsets, or `None` if a section is missing from the layout.
    pub fn range(&self, layout: &dyn SectionLayout) -> Option<(f32, f32)> {
        let viewport = layout.viewport_height();
        let start = self
            .start
            .offset(layout.section_bounds(&self.trigger)?, viewport);
        let end = self
            .end
            .offset(layout.section_bounds(&self.end_trigger)?, viewport);
        Some((start, end))
    }

    pub fn progress(&self, scroll: f32, layout: &dyn SectionLayout) -> Option<f32> {
        let (start, end) = self.range(layout)?;
        Some(range_progress(scroll, start, end))
    }
}

pub fn range_progress(scroll: f32, start: f32, end: f32) -> f32 {
    if end <= start {
        return if scroll >= start { 1.0 } else { 0.0 };
    }
    ((scroll - start) / (end - start)).clamp(0.0, 1.0)
}

/// Section containers stacked one after another, each section one viewport tall.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedLayout {
    containers: Vec<(String, u32)>,
    viewport_height: f32,
}

impl StackedLayout {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            containers: Vec::new(),
            viewport_height,
        }
    }

    pub fn with_container(mut self, name: impl Into<String>, sections: u32) -> Self {
        self.containers.push((name.into(), sections));
        self
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(1.0);
    }

    pub fn page_height(&self) -> f32 {
        self.containers.iter().map(|(_, n)| *n as f32).sum::<f32>() * self.viewport_height
    }

    pub fn max_scroll(&self) -> f32 {
        (self.page_height() - self.viewport_height).max(0.0)
    }

    /// Top offset and height of a whole container.
    pub fn container_bounds(&self, name: &str) -> Option<SectionBounds> {
        let mut top = 0.0;
        for (container, sections) in &self.containers {
            let height = *sections as f32 * self.viewport_height;
            if container == name {
                return Some(SectionBounds { top, height });
            }
            top += height;
        }
        None
    }

    /// Container spanning `offset`, clamped to the first/last container.
    pub fn container_at(&self, offset: f32) -> Option<&str> {
        let mut top = 0.0;
        let mut last = None;
        for (container, sections) in &self.containers {
            top += *sections as f32 * self.viewport_height;
            last = Some(container.as_str());
            if offset < top {
                return last;
            }
        }
        last
    }
}

impl SectionLayout for StackedLayout {
    fn section_bounds(&self, section: &SectionRef) -> Option<SectionBounds> {
        let container = self.container_bounds(&section.container)?;
        let count = (container.height / self.viewport_height).round() as u32;
        if section.index == 0 || section.index > count {
            return None;
        }
        Some(SectionBounds {
            top: container.top + (section.index - 1) as f32 * self.viewport_height,
            height: self.viewport_height,
        })
    }

    fn viewport_height(&self) -> f32 {
        self.viewport_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> StackedLayout {
        StackedLayout::new(100.0)
            .with_container("face-section", 5)
            .with_container("squares-section", 10)
    }

    #[test]
    fn parses_placements() {
        let placement: Placement = "top bottom".parse().unwrap();
        assert_eq!(placement, Placement::TOP_BOTTOM);
        let placement: Placement = "center 25%".parse().unwrap();
        assert_eq!(placement.element, Edge::Fraction(0.5));
        assert_eq!(placement.viewport, Edge::Fraction(0.25));
        let placement: Placement = "100px top".parse().unwrap();
        assert_eq!(placement.element, Edge::Pixels(100.0));
        assert!("middle bottom".parse::<Placement>().is_err());
        assert!("top bottom extra".parse::<Placement>().is_err());
    }

    #[test]
    fn stacked_sections_follow_each_other() {
        let layout = layout();
        let bounds = layout
            .section_bounds(&SectionRef::new("squares-section", 2))
            .unwrap();
        assert_eq!(bounds.top, 600.0);
        assert!(layout
            .section_bounds(&SectionRef::new("squares-section", 11))
            .is_none());
        assert_eq!(layout.container_at(450.0), Some("face-section"));
        assert_eq!(layout.container_at(500.0), Some("squares-section"));
        assert_eq!(layout.container_at(1e9), Some("squares-section"));
        assert_eq!(layout.max_scroll(), 1400.0);
    }

    #[test]
    fn progress_clamps_to_unit_range() {
        let layout = layout();
        let trigger = ScrollTrigger::between(
            SectionRef::new("squares-section", 1),
            SectionRef::new("squares-section", 3),
        );
        assert_eq!(trigger.range(&layout), Some((400.0, 600.0)));
        assert_eq!(trigger.progress(0.0, &layout), Some(0.0));
        assert_eq!(trigger.progress(500.0, &layout), Some(0.5));
        assert_eq!(trigger.progress(5000.0, &layout), Some(1.0));
    }

    #[test]
    fn empty_range_is_a_step() {
        assert_eq!(range_progress(9.0, 10.0, 10.0), 0.0);
        assert_eq!(range_progress(10.0, 10.0, 10.0), 1.0);
    }

    #[test]
    fn selector_names_section() {
        assert_eq!(
            SectionRef::new("face-section", 3).selector(),
            "#face-section .section.n_3"
        );
    }
}
