//! Greedy placement of non-overlapping labels.
//!
//! Each pass scores every pending candidate by how much of its area overlaps
//! fixed labels and competing candidates, then locks in the cheapest
//! candidate of each subject found in the best part of the ranking. Every
//! pass fixes at least one subject and discards the rest of its candidates,
//! so the number of passes is bounded by the number of subjects.

use crate::config::MapConfig;
use crate::geometry::{Point, Rect};
use ahash::AHashSet;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use rstar::RTree;
use rstar::primitives::{GeomWithData, Rectangle};
use serde::Serialize;

/// The map object a label annotates. Indices point into the scene's
/// district list or the organizer's stop groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LabelSubject {
    District(usize),
    StopGroup(usize),
}

#[derive(Debug, Clone, Serialize)]
pub struct Label {
    pub anchor: Point,
    pub bounds: Rect,
    pub subject: LabelSubject,
    pub penalty: f64,
}

impl Label {
    pub fn new(anchor: Point, width: f64, height: f64, subject: LabelSubject) -> Self {
        Self {
            anchor,
            bounds: Rect::centered(anchor, width, height),
            subject,
            penalty: 0.0,
        }
    }

    /// A label whose box is already known, e.g. measured text.
    pub fn with_bounds(bounds: Rect, subject: LabelSubject) -> Self {
        Self {
            anchor: bounds.center(),
            bounds,
            subject,
            penalty: 0.0,
        }
    }

    pub fn area(&self) -> f64 {
        self.bounds.area()
    }
}

type LabelTree = RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>;

fn index_labels(labels: &[Label]) -> LabelTree {
    RTree::bulk_load(
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let b = &label.bounds;
                GeomWithData::new(Rectangle::from_corners([b.x1, b.y1], [b.x2, b.y2]), i)
            })
            .collect(),
    )
}

#[derive(Debug, Clone)]
pub struct LabelPlacement {
    fixed: Vec<Label>,
    candidates: Vec<Label>,
    chosen: Vec<Label>,
    window_min: usize,
    window_divisor: usize,
}

impl Default for LabelPlacement {
    fn default() -> Self {
        Self::new(&MapConfig::default())
    }
}

impl LabelPlacement {
    pub fn new(config: &MapConfig) -> Self {
        Self {
            fixed: Vec::new(),
            candidates: Vec::new(),
            chosen: Vec::new(),
            window_min: config.label_window_min.max(1),
            window_divisor: config.label_window_divisor.max(1),
        }
    }

    pub fn fixed_labels(&self) -> &[Label] {
        &self.fixed
    }

    pub fn candidate_labels(&self) -> &[Label] {
        &self.candidates
    }

    /// Labels picked by the most recent pass. They are promoted to fixed at
    /// the start of the next pass.
    pub fn chosen_candidates(&self) -> &[Label] {
        &self.chosen
    }

    pub fn is_complete(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn add_fixed_label(&mut self, label: Label) {
        if self.fixed.iter().any(|l| l.subject == label.subject) {
            warn!("Ignoring second fixed label for {:?}", label.subject);
            return;
        }
        self.fixed.push(label);
    }

    pub fn add_candidate(&mut self, label: Label) {
        self.candidates.push(label);
    }

    /// Runs one placement pass and returns the resulting state.
    pub fn generate(mut self) -> Self {
        self.fixed.append(&mut self.chosen);

        let placed: AHashSet<LabelSubject> = self.fixed.iter().map(|l| l.subject).collect();
        self.candidates.retain(|l| !placed.contains(&l.subject));

        if self.candidates.is_empty() {
            return self;
        }

        self.update_penalties();

        let total = self.candidates.len();
        let window = (total / self.window_divisor).max(self.window_min).min(total);
        let max_penalty = self.candidates[window - 1].penalty;

        let mut found = AHashSet::new();
        for label in self
            .candidates
            .iter()
            .take_while(|l| l.penalty <= max_penalty)
        {
            if found.insert(label.subject) {
                self.chosen.push(label.clone());
            }
        }

        self.candidates.retain(|l| !found.contains(&l.subject));

        debug!(
            "Label pass: window {} of {}, chose {}, {} candidates left",
            window,
            total,
            self.chosen.len(),
            self.candidates.len()
        );

        self
    }

    /// Stops placing: keeps what has been chosen so far and drops every
    /// pending candidate. Returns how many candidates were dropped.
    pub fn abandon_remaining(&mut self) -> usize {
        self.fixed.append(&mut self.chosen);
        let dropped = self.candidates.len();
        self.candidates.clear();
        dropped
    }

    /// Scores every candidate by overlapped fraction of its own area and
    /// sorts them best first. Candidates of the same subject never penalize
    /// each other since only one of them survives.
    fn update_penalties(&mut self) {
        let fixed_tree = index_labels(&self.fixed);
        let candidate_tree = index_labels(&self.candidates);

        let penalties: Vec<f64> = self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let area = label.area();
                if area <= 0.0 {
                    return 0.0;
                }
                let envelope = label.bounds.envelope();

                let fixed_overlap: f64 = fixed_tree
                    .locate_in_envelope_intersecting(&envelope)
                    .map(|item| label.bounds.overlap_area(&self.fixed[item.data].bounds))
                    .sum();

                let candidate_overlap: f64 = candidate_tree
                    .locate_in_envelope_intersecting(&envelope)
                    .filter(|item| {
                        item.data != i && self.candidates[item.data].subject != label.subject
                    })
                    .map(|item| label.bounds.overlap_area(&self.candidates[item.data].bounds))
                    .sum();

                (fixed_overlap + candidate_overlap) / area
            })
            .collect();

        for (label, penalty) in self.candidates.iter_mut().zip(penalties) {
            label.penalty = penalty;
        }
        self.candidates.sort_by_key(|l| OrderedFloat(l.penalty));
    }
}
