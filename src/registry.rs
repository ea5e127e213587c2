//! Sequence description: which timepoints and view setups a dataset has,
//! and which angle, channel and illumination each setup stands for.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// A logical view, addressed by timepoint and view setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId {
    pub timepoint: usize,
    pub setup: usize,
}

impl ViewId {
    pub fn new(timepoint: usize, setup: usize) -> Self {
        Self { timepoint, setup }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewsetup={} timepoint={}", self.setup, self.timepoint)
    }
}

/// Attribute ids of one view setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSetup {
    pub id: usize,
    /// Angle attribute id; doubles as the capture index in the source file.
    pub angle: usize,
    pub channel: usize,
    pub illumination: usize,
}

impl ViewSetup {
    pub fn new(id: usize, angle: usize, channel: usize) -> Self {
        Self {
            id,
            angle,
            channel,
            illumination: 0,
        }
    }

    pub fn with_illumination(mut self, illumination: usize) -> Self {
        self.illumination = illumination;
        self
    }
}

/// Read-only description of one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDescription {
    pub timepoint: usize,
    pub setup: ViewSetup,
}

pub trait SequenceRegistry: Send + Sync {
    fn view_description(&self, view: &ViewId) -> Option<ViewDescription>;
}

#[derive(Debug, Clone, Default)]
pub struct SequenceDescription {
    timepoints: BTreeSet<usize>,
    setups: BTreeMap<usize, ViewSetup>,
    missing: HashSet<ViewId>,
}

impl SequenceDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timepoints(mut self, timepoints: impl IntoIterator<Item = usize>) -> Self {
        self.timepoints.extend(timepoints);
        self
    }

    pub fn with_setup(mut self, setup: ViewSetup) -> Self {
        self.setups.insert(setup.id, setup);
        self
    }

    /// Mark a view as not acquired. It resolves to nothing.
    pub fn with_missing_view(mut self, view: ViewId) -> Self {
        self.missing.insert(view);
        self
    }

    /// Every view that resolves, ordered by timepoint then setup.
    pub fn views(&self) -> Vec<ViewId> {
        self.timepoints
            .iter()
            .flat_map(|&timepoint| {
                self.setups
                    .keys()
                    .map(move |&setup| ViewId::new(timepoint, setup))
            })
            .filter(|view| !self.missing.contains(view))
            .collect()
    }
}

impl SequenceRegistry for SequenceDescription {
    fn view_description(&self, view: &ViewId) -> Option<ViewDescription> {
        if self.missing.contains(view) || !self.timepoints.contains(&view.timepoint) {
            return None;
        }
        let setup = *self.setups.get(&view.setup)?;
        Some(ViewDescription {
            timepoint: view.timepoint,
            setup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence() -> SequenceDescription {
        SequenceDescription::new()
            .with_timepoints([0, 1])
            .with_setup(ViewSetup::new(0, 0, 0))
            .with_setup(ViewSetup::new(1, 2, 1).with_illumination(1))
            .with_missing_view(ViewId::new(1, 0))
    }

    #[test]
    fn test_view_description_carries_attributes() {
        let vd = sequence().view_description(&ViewId::new(1, 1)).unwrap();
        assert_eq!(vd.timepoint, 1);
        assert_eq!(vd.setup.angle, 2);
        assert_eq!(vd.setup.channel, 1);
        assert_eq!(vd.setup.illumination, 1);
    }

    #[test]
    fn test_unknown_views_do_not_resolve() {
        let sequence = sequence();
        assert!(sequence.view_description(&ViewId::new(2, 0)).is_none());
        assert!(sequence.view_description(&ViewId::new(0, 7)).is_none());
        assert!(sequence.view_description(&ViewId::new(1, 0)).is_none());
    }

    #[test]
    fn test_views_skip_missing() {
        let views = sequence().views();
        assert_eq!(
            views,
            vec![ViewId::new(0, 0), ViewId::new(0, 1), ViewId::new(1, 1)]
        );
    }

    #[test]
    fn test_view_id_display() {
        assert_eq!(ViewId::new(3, 5).to_string(), "viewsetup=5 timepoint=3");
    }
}
