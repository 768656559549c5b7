//! DPI scale step translation
//!
//! The OS reports the DPI scaling of a source as a contiguous signed step
//! range around a recommended step `0`. Translating between steps and named
//! percentages is pure index arithmetic over the fixed, densely-ordered
//! scale list below, which matches the OS's own step numbering.

use serde::{Deserialize, Serialize};

/// Named DPI scaling percentages, sorted ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DpiScale {
    Percent100 = 100,
    Percent125 = 125,
    Percent150 = 150,
    Percent175 = 175,
    Percent200 = 200,
    Percent225 = 225,
    Percent250 = 250,
    Percent300 = 300,
    Percent350 = 350,
    Percent400 = 400,
    Percent450 = 450,
    Percent500 = 500,
}

impl DpiScale {
    /// Every named scale, in the OS step order. No gaps; the step math in
    /// [`ScaleSteps`] relies on this being dense and ascending.
    pub const ALL: [DpiScale; 12] = [
        DpiScale::Percent100,
        DpiScale::Percent125,
        DpiScale::Percent150,
        DpiScale::Percent175,
        DpiScale::Percent200,
        DpiScale::Percent225,
        DpiScale::Percent250,
        DpiScale::Percent300,
        DpiScale::Percent350,
        DpiScale::Percent400,
        DpiScale::Percent450,
        DpiScale::Percent500,
    ];

    pub fn percent(self) -> u32 {
        self as u32
    }

    fn index(self) -> i64 {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0) as i64
    }
}

impl std::fmt::Display for DpiScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// DPI scale state of a source: signed step offsets from the recommended
/// step, which is always `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleSteps {
    pub minimum: i32,
    pub current: i32,
    pub maximum: i32,
}

impl ScaleSteps {
    pub fn new(minimum: i32, current: i32, maximum: i32) -> Self {
        Self {
            minimum,
            current,
            maximum,
        }
    }

    /// The named scale currently applied.
    pub fn current_scale(&self) -> Option<DpiScale> {
        self.scale_at(self.current)
    }

    /// The OS-recommended named scale (step `0`).
    pub fn recommended_scale(&self) -> Option<DpiScale> {
        self.scale_at(0)
    }

    /// The largest named scale the source supports.
    pub fn maximum_scale(&self) -> Option<DpiScale> {
        self.scale_at(self.maximum)
    }

    /// The smallest named scale the source supports.
    pub fn minimum_scale(&self) -> Option<DpiScale> {
        self.scale_at(self.minimum)
    }

    /// The signed step count to submit so the source ends up at `desired`.
    pub fn steps_to(&self, desired: DpiScale) -> Option<i32> {
        let recommended = self.recommended_scale()?;
        Some((desired.index() - recommended.index()) as i32)
    }

    fn scale_at(&self, step: i32) -> Option<DpiScale> {
        // The named list is indexed by distance from the minimum step
        let index = self.minimum.unsigned_abs() as i64 + step as i64;
        if index < 0 {
            return None;
        }
        DpiScale::ALL.get(index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_translation_round_trip() {
        // Synthetic range over 100..200%: two steps below and above 150%
        let steps = ScaleSteps::new(-2, 0, 2);
        assert_eq!(steps.current_scale(), Some(DpiScale::Percent150));
        assert_eq!(steps.recommended_scale(), Some(DpiScale::Percent150));
        assert_eq!(steps.maximum_scale(), Some(DpiScale::Percent200));
        assert_eq!(steps.minimum_scale(), Some(DpiScale::Percent100));
        assert_eq!(steps.steps_to(DpiScale::Percent200), Some(2));
    }

    #[test]
    fn test_steps_below_recommended() {
        let steps = ScaleSteps::new(-2, -1, 2);
        assert_eq!(steps.current_scale(), Some(DpiScale::Percent125));
        assert_eq!(steps.steps_to(DpiScale::Percent100), Some(-2));
    }

    #[test]
    fn test_recommended_at_list_start() {
        // Recommended is the smallest supported scale
        let steps = ScaleSteps::new(0, 1, 4);
        assert_eq!(steps.recommended_scale(), Some(DpiScale::Percent100));
        assert_eq!(steps.current_scale(), Some(DpiScale::Percent125));
        assert_eq!(steps.maximum_scale(), Some(DpiScale::Percent200));
        assert_eq!(steps.steps_to(DpiScale::Percent500), Some(11));
    }

    #[test]
    fn test_degenerate_range_yields_none() {
        // A minimum further below recommended than the table is long cannot
        // be translated
        let steps = ScaleSteps::new(-20, 0, 2);
        assert_eq!(steps.current_scale(), None);
        assert_eq!(steps.steps_to(DpiScale::Percent100), None);
    }

    #[test]
    fn test_scale_percent_values() {
        assert_eq!(DpiScale::Percent100.percent(), 100);
        assert_eq!(DpiScale::Percent500.percent(), 500);
        assert_eq!(DpiScale::ALL.len(), 12);
        // Dense ascending order
        for pair in DpiScale::ALL.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
    }
}
