//! Rolling min/max waveform capture for an external renderer.

use crate::element::ElementIndex;

/// One scope channel: a fixed-capacity circular buffer of (min, max)
/// sample pairs taken from a watched element terminal.
///
/// Each accepted simulation step extends the bucket being filled; after
/// `speed` steps the bucket is complete and the write position advances,
/// wrapping around and overwriting the oldest bucket once the buffer is
/// full. The renderer reads completed buckets between steps.
#[derive(Debug, Clone)]
pub struct ScopeWave {
    element: ElementIndex,
    terminal: usize,
    speed: usize,
    color: u32,
    min: Vec<f64>,
    max: Vec<f64>,
    ptr: usize,
    counter: usize,
    filled: usize,
}

impl ScopeWave {
    /// A channel watching `terminal` of `element`, holding `capacity`
    /// buckets of `speed` steps each.
    pub fn new(element: ElementIndex, terminal: usize, capacity: usize, speed: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            element,
            terminal,
            speed: speed.max(1),
            color: 0x00ff00,
            min: vec![0.0; capacity],
            max: vec![0.0; capacity],
            ptr: 0,
            counter: 0,
            filled: 0,
        }
    }

    /// Same channel with a render color tag.
    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn element(&self) -> ElementIndex {
        self.element
    }

    pub fn terminal(&self) -> usize {
        self.terminal
    }

    /// Steps per sample bucket.
    pub fn speed(&self) -> usize {
        self.speed
    }

    /// Render color tag.
    pub fn color(&self) -> u32 {
        self.color
    }

    /// Change the sampling interval, discarding captured samples.
    pub fn set_speed(&mut self, speed: usize) {
        self.speed = speed.max(1);
        self.reset();
    }

    /// Discard all captured samples.
    pub fn reset(&mut self) {
        self.ptr = 0;
        self.counter = 0;
        self.filled = 0;
    }

    /// Record one step's value into the current bucket.
    pub fn record(&mut self, value: f64) {
        if self.counter == 0 {
            self.min[self.ptr] = value;
            self.max[self.ptr] = value;
        } else {
            if value < self.min[self.ptr] {
                self.min[self.ptr] = value;
            }
            if value > self.max[self.ptr] {
                self.max[self.ptr] = value;
            }
        }
        self.counter += 1;
        if self.counter >= self.speed {
            self.counter = 0;
            self.ptr = (self.ptr + 1) % self.min.len();
            if self.filled < self.min.len() {
                self.filled += 1;
            }
        }
    }

    /// Completed (min, max) buckets, oldest first.
    pub fn samples(&self) -> Vec<(f64, f64)> {
        let capacity = self.min.len();
        let start = (self.ptr + capacity - self.filled) % capacity;
        (0..self.filled)
            .map(|i| {
                let idx = (start + i) % capacity;
                (self.min[idx], self.max[idx])
            })
            .collect()
    }

    /// The bucket currently being filled, if any steps landed in it.
    pub fn partial(&self) -> Option<(f64, f64)> {
        (self.counter > 0).then(|| (self.min[self.ptr], self.max[self.ptr]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_extends_min_max() {
        let mut scope = ScopeWave::new(0, 0, 4, 3);
        scope.record(1.0);
        scope.record(-2.0);
        scope.record(0.5);

        assert_eq!(scope.samples(), vec![(-2.0, 1.0)]);
        assert_eq!(scope.partial(), None);
    }

    #[test]
    fn test_rollover_after_speed_steps() {
        let mut scope = ScopeWave::new(0, 0, 4, 2);
        scope.record(1.0);
        scope.record(2.0);
        scope.record(3.0);

        assert_eq!(scope.samples(), vec![(1.0, 2.0)]);
        assert_eq!(scope.partial(), Some((3.0, 3.0)));
    }

    #[test]
    fn test_wraparound_overwrites_oldest() {
        let mut scope = ScopeWave::new(0, 0, 2, 1);
        scope.record(1.0);
        scope.record(2.0);
        scope.record(3.0);

        assert_eq!(scope.samples(), vec![(2.0, 2.0), (3.0, 3.0)]);
    }

    #[test]
    fn test_set_speed_resets() {
        let mut scope = ScopeWave::new(0, 0, 4, 1);
        scope.record(1.0);
        scope.set_speed(8);
        assert!(scope.samples().is_empty());
        assert_eq!(scope.speed(), 8);
    }
}
