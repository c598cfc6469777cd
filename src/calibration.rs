//! Scene-brightness feedback shared by the calibrated shaders.
//!
//! Each pass counts sampled luma into a coarse histogram. When a pass
//! completes, the ceiling moves halfway toward the most populated bucket and
//! the histogram is consumed. A cancelled pass never reaches `end_frame`, so
//! its counts stay in the histogram and carry into the next pass.

pub const HISTOGRAM_BUCKETS: usize = 64;
const BUCKET_WIDTH: u32 = 4;
const MIN_MAX_LUMA: u8 = 1;
const MAX_MAX_LUMA: u8 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaCalibration {
    histogram: [u32; HISTOGRAM_BUCKETS],
    max_luma: u8,
}

impl Default for LumaCalibration {
    fn default() -> Self {
        Self::new()
    }
}

impl LumaCalibration {
    pub fn new() -> Self {
        Self {
            histogram: [0; HISTOGRAM_BUCKETS],
            max_luma: MAX_MAX_LUMA,
        }
    }

    pub fn max_luma(&self) -> u8 {
        self.max_luma
    }

    pub fn histogram(&self) -> &[u32; HISTOGRAM_BUCKETS] {
        &self.histogram
    }

    /// Samples counted since the ceiling last moved.
    pub fn pending_samples(&self) -> u64 {
        self.histogram.iter().map(|count| u64::from(*count)).sum()
    }

    /// `luma / max_luma` clamped to `0.0..=1.0`.
    pub fn normalize(&self, luma: f32) -> f32 {
        (luma / f32::from(self.max_luma)).clamp(0.0, 1.0)
    }

    pub fn record(&mut self, luma: f32) {
        let bucket = bucket_for(luma);
        self.histogram[bucket] = self.histogram[bucket].saturating_add(1);
    }

    /// Moves the ceiling toward the histogram mode and zeroes the histogram.
    ///
    /// An empty histogram resolves to bucket 0, like any other tie.
    pub fn end_frame(&mut self) {
        let mut mode_bucket = 0;
        let mut mode_count = 0;
        for (bucket, count) in self.histogram.iter_mut().enumerate() {
            if *count > mode_count {
                mode_count = *count;
                mode_bucket = bucket;
            }
            *count = 0;
        }

        let target = mode_bucket as u32 * BUCKET_WIDTH;
        let next = (target + u32::from(self.max_luma)) / 2;
        self.max_luma = next.clamp(u32::from(MIN_MAX_LUMA), u32::from(MAX_MAX_LUMA)) as u8;
    }
}

fn bucket_for(luma: f32) -> usize {
    let bucket = (luma.max(0.0) as u32) / BUCKET_WIDTH;
    (bucket as usize).min(HISTOGRAM_BUCKETS - 1)
}
