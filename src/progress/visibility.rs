// Viewport visibility observation
// Tracks, per registered region, whether its visible ratio is at or above a
// threshold and reports only the crossings.

use std::collections::BTreeMap;

/// A vertical extent in document pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: f64,
    pub end: f64,
}

impl Span {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0.0
    }
}

/// Fraction of `region` inside `viewport`, in `[0, 1]`
pub fn visible_ratio(region: Span, viewport: Span) -> f32 {
    let height = region.len();
    if height == 0.0 {
        return 0.0;
    }
    let overlap = (region.end.min(viewport.end) - region.start.max(viewport.start)).max(0.0);
    (overlap / height).min(1.0) as f32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Entered(usize),
    Left(usize),
}

pub struct VisibilityObserver {
    threshold: f32,
    regions: BTreeMap<usize, bool>,
}

impl VisibilityObserver {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            regions: BTreeMap::new(),
        }
    }

    pub fn observe(&mut self, index: usize) {
        self.regions.entry(index).or_insert(false);
    }

    pub fn observe_range(&mut self, count: usize) {
        for index in 0..count {
            self.observe(index);
        }
    }

    pub fn disconnect(&mut self) {
        self.regions.clear();
    }

    pub fn is_observed(&self, index: usize) -> bool {
        self.regions.contains_key(&index)
    }

    /// Feed a new visible ratio for one region
    pub fn update(&mut self, index: usize, ratio: f32) -> Option<Crossing> {
        let threshold = self.threshold;
        let above = self.regions.get_mut(&index)?;
        let now_above = ratio >= threshold;
        if *above == now_above {
            return None;
        }
        *above = now_above;
        Some(if now_above {
            Crossing::Entered(index)
        } else {
            Crossing::Left(index)
        })
    }

    /// Recompute every listed region against a viewport, in region order
    pub fn measure(&mut self, viewport: Span, regions: &[(usize, Span)]) -> Vec<Crossing> {
        regions
            .iter()
            .filter_map(|(index, span)| self.update(*index, visible_ratio(*span, viewport)))
            .collect()
    }
}
