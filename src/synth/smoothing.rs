//! Exponential parameter smoothing

/// Distance below which a smoothed value snaps onto its target
const SNAP_THRESHOLD: f32 = 1e-5;

/// A value that approaches its target exponentially.
///
/// `coefficient` is the fraction of the remaining distance covered per
/// sample. Advancing by a whole buffer applies the same curve as advancing
/// sample by sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothed {
    current: f32,
    target: f32,
    coefficient: f32,
}

impl Smoothed {
    pub fn new(value: f32, coefficient: f32) -> Self {
        Self {
            current: value,
            target: value,
            coefficient: coefficient.clamp(0.0, 1.0),
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target;
        }
    }

    pub fn set_coefficient(&mut self, coefficient: f32) {
        self.coefficient = coefficient.clamp(0.0, 1.0);
    }

    /// Jump straight to the target
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Advance by `frames` samples and return the new value
    pub fn advance(&mut self, frames: usize) -> f32 {
        if frames == 0 || self.is_settled() {
            return self.current;
        }

        let remaining = (1.0 - self.coefficient as f64).powi(frames.min(i32::MAX as usize) as i32);
        let step = (1.0 - remaining) as f32;
        self.current += (self.target - self.current) * step;

        if (self.target - self.current).abs() < SNAP_THRESHOLD {
            self.current = self.target;
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approaches_target() {
        let mut value = Smoothed::new(0.0, 0.01);
        value.set_target(1.0);

        let first = value.advance(1);
        assert!((first - 0.01).abs() < 1e-6);

        let mut last = first;
        for _ in 0..100 {
            let next = value.advance(64);
            assert!(next >= last);
            assert!(next <= 1.0);
            last = next;
        }
        assert!(value.is_settled());
    }

    #[test]
    fn test_block_matches_per_sample() {
        let mut block = Smoothed::new(0.2, 0.005);
        let mut single = Smoothed::new(0.2, 0.005);
        block.set_target(0.9);
        single.set_target(0.9);

        block.advance(256);
        for _ in 0..256 {
            single.advance(1);
        }
        assert!((block.current() - single.current()).abs() < 1e-4);
    }

    #[test]
    fn test_full_coefficient_is_immediate() {
        let mut value = Smoothed::new(0.0, 1.0);
        value.set_target(0.75);
        assert_eq!(value.advance(1), 0.75);
    }

    #[test]
    fn test_non_finite_target_ignored() {
        let mut value = Smoothed::new(0.5, 0.1);
        value.set_target(f32::NAN);
        assert_eq!(value.target(), 0.5);
        value.snap();
        assert_eq!(value.current(), 0.5);
    }
}
