//! Sample rate conversion between device and wire rates
//!
//! Devices run at whatever rate the host prefers; the wire runs at the
//! configured capture and playback rates. Conversion is linear
//! interpolation. [`resample`] converts one self-contained chunk, and
//! [`StreamResampler`] converts a continuous stream delivered in
//! arbitrary blocks without seams between them.

/// Resample a complete chunk from `from` Hz to `to` Hz.
///
/// The output holds `ceil(len * to / from)` samples, so a chunk never
/// becomes shorter than its duration at the target rate.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let output_len = (samples.len() as u64 * to as u64).div_ceil(from as u64) as usize;
    let step = from as f64 / to as f64;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let position = i as f64 * step;
            let index = (position as usize).min(last);
            let frac = (position - index as f64).clamp(0.0, 1.0) as f32;
            let left = samples[index];
            let right = samples.get(index + 1).copied().unwrap_or(left);
            left + (right - left) * frac
        })
        .collect()
}

/// Streaming linear resampler
///
/// Keeps the last input sample and the fractional read position between
/// calls, so splitting the input differently yields the same output.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    /// Input samples advanced per output sample
    step: f64,
    /// Next read position relative to the next block; `[-1, 0)` reads
    /// between `previous` and the first new sample
    position: f64,
    previous: f32,
    passthrough: bool,
}

impl StreamResampler {
    pub fn new(from: u32, to: u32) -> Self {
        let passthrough = from == to || from == 0 || to == 0;
        Self {
            step: if passthrough { 1.0 } else { from as f64 / to as f64 },
            position: 0.0,
            previous: 0.0,
            passthrough,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    /// Convert `input`, appending the produced samples to `out`
    pub fn process(&mut self, input: &[f32], out: &mut Vec<f32>) {
        if self.passthrough {
            out.extend_from_slice(input);
            return;
        }
        let Some(&last) = input.last() else {
            return;
        };

        let end = (input.len() - 1) as f64;
        while self.position <= end {
            let floor = self.position.floor();
            let frac = (self.position - floor) as f32;
            let (left, right) = if floor < 0.0 {
                (self.previous, input[0])
            } else {
                let index = floor as usize;
                let left = input[index];
                (left, input.get(index + 1).copied().unwrap_or(left))
            };
            out.push(left + (right - left) * frac);
            self.position += self.step;
        }

        self.position -= input.len() as f64;
        self.previous = last;
    }
}
