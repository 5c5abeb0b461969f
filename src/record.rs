use crate::constants::TriState;

/// Samples of one completed block measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockData {
    sample_frequency: f64,
    start_index: u64,
    channels: Vec<Vec<f32>>,
}

impl BlockData {
    pub fn new(sample_frequency: f64, start_index: u64, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_frequency,
            start_index,
            channels,
        }
    }

    /// Hz, as granted by the instrument.
    pub fn sample_frequency(&self) -> f64 {
        self.sample_frequency
    }

    /// Position of the first sample within the record.
    pub fn start_index(&self) -> u64 {
        self.start_index
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel. Ragged data reports its shortest channel.
    pub fn sample_count(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    pub fn channel(&self, ch: usize) -> Option<&[f32]> {
        self.channels.get(ch).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }

    /// Seconds from the start of the record to sample `i` of this block.
    pub fn time_of(&self, i: usize) -> f64 {
        (self.start_index as f64 + i as f64) / self.sample_frequency
    }
}

/// Outcome of a connection test, one entry per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTestResult {
    channels: Vec<TriState>,
}

impl ConnectionTestResult {
    pub fn new(channels: Vec<TriState>) -> Self {
        Self { channels }
    }

    pub fn channel(&self, ch: usize) -> Option<TriState> {
        self.channels.get(ch).copied()
    }

    pub fn channels(&self) -> &[TriState] {
        &self.channels
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, TriState)> + '_ {
        self.channels.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_dimensions() {
        let data = BlockData::new(1e6, 0, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        assert_eq!(data.channel_count(), 2);
        assert_eq!(data.sample_count(), 3);
        assert_eq!(data.channel(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(data.channel(2), None);
        assert!((data.time_of(2) - 2e-6).abs() < 1e-12);
    }

    #[test]
    fn test_empty_block() {
        let data = BlockData::new(1e6, 0, Vec::new());
        assert!(data.is_empty());
        assert_eq!(data.sample_count(), 0);
    }
}
