//! Rolling analysis windows over the incoming stereo stream.
//!
//! Each channel keeps a tail of the last hop worth of samples. A new block
//! is appended to the tail and the window is the last `window_len` samples
//! of that concatenation, so successive windows advance by exactly one hop
//! and overlap by `window_len - hop_len` once enough input has been seen.

use delfi_types::audio::{AnalysisWindow, StereoBlock};

#[derive(Debug)]
pub struct WindowBuffer {
    sample_rate: u32,
    window_len: usize,
    hop_len: usize,
    tail_left: Vec<f32>,
    tail_right: Vec<f32>,
    next_seq: u64,
}

impl WindowBuffer {
    pub fn new(sample_rate: u32, window_sec: f32, hop_sec: f32) -> Self {
        Self {
            sample_rate,
            window_len: (window_sec * sample_rate as f32).round() as usize,
            hop_len: (hop_sec * sample_rate as f32).round() as usize,
            tail_left: Vec::new(),
            tail_right: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn hop_len(&self) -> usize {
        self.hop_len
    }

    /// Whether `window` is still shorter than a full analysis window.
    pub fn is_warmup(&self, window: &AnalysisWindow) -> bool {
        window.len() < self.window_len
    }

    /// Folds one block into the rolling state and emits the next window.
    pub fn push(&mut self, block: &StereoBlock) -> AnalysisWindow {
        let left = roll(
            &mut self.tail_left,
            block.left(),
            self.window_len,
            self.hop_len,
        );
        let right = roll(
            &mut self.tail_right,
            block.right(),
            self.window_len,
            self.hop_len,
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        AnalysisWindow {
            sample_rate: self.sample_rate,
            seq,
            left,
            right,
        }
    }
}

fn roll(tail: &mut Vec<f32>, incoming: &[f32], window_len: usize, hop_len: usize) -> Vec<f32> {
    let mut effective = Vec::with_capacity(tail.len() + incoming.len());
    effective.extend_from_slice(tail);
    effective.extend_from_slice(incoming);

    let window_start = effective.len().saturating_sub(window_len);
    let window = effective[window_start..].to_vec();

    let tail_start = effective.len().saturating_sub(hop_len);
    tail.clear();
    tail.extend_from_slice(&effective[tail_start..]);
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RATE: u32 = 1000;

    fn block(samples: Vec<f32>) -> StereoBlock {
        let right: Vec<f32> = samples.iter().map(|s| -s).collect();
        StereoBlock::new(RATE, samples, right)
    }

    fn ramp(start: usize, len: usize) -> Vec<f32> {
        (start..start + len).map(|i| i as f32).collect()
    }

    #[test]
    fn windows_overlap_by_exactly_one_hop() {
        // 0.8 s window, 0.4 s hop at 1 kHz: N = 800, H = 400
        let mut buffer = WindowBuffer::new(RATE, 0.8, 0.4);
        let mut windows = Vec::new();
        for i in 0..6 {
            windows.push(buffer.push(&block(ramp(i * 400, 400))));
        }
        for pair in windows.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.len() < 800 || next.len() < 800 {
                continue;
            }
            // the first N - H samples of a window repeat the previous one
            assert_eq!(&next.left[..400], &prev.left[400..]);
            assert_eq!(&next.right[..400], &prev.right[400..]);
        }
        // with contiguous input the emitted samples are contiguous too
        let last = windows.last().unwrap();
        assert_eq!(last.left, ramp(5 * 400 + 400 - 800, 800));
    }

    #[test]
    fn warmup_windows_grow_until_full() {
        let mut buffer = WindowBuffer::new(RATE, 0.8, 0.4);
        let first = buffer.push(&block(ramp(0, 400)));
        assert_eq!(first.len(), 400);
        assert!(buffer.is_warmup(&first));
        let second = buffer.push(&block(ramp(400, 400)));
        assert_eq!(second.len(), 800);
        assert!(!buffer.is_warmup(&second));
    }

    #[test]
    fn oversized_block_is_trimmed_to_window() {
        let mut buffer = WindowBuffer::new(RATE, 0.8, 0.4);
        let window = buffer.push(&block(ramp(0, 2000)));
        assert_eq!(window.len(), 800);
        assert_eq!(window.left, ramp(1200, 800));
        // the next push still advances by one hop
        let next = buffer.push(&block(ramp(2000, 400)));
        assert_eq!(next.left, ramp(1600, 800));
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let mut buffer = WindowBuffer::new(RATE, 0.8, 0.4);
        for expected in 0..5 {
            let window = buffer.push(&block(ramp(0, 100)));
            assert_eq!(window.seq, expected);
        }
    }

    #[test]
    fn tiny_blocks_accumulate_into_the_tail() {
        let mut buffer = WindowBuffer::new(RATE, 0.8, 0.4);
        for i in 0..8 {
            buffer.push(&block(ramp(i * 100, 100)));
        }
        let window = buffer.push(&block(ramp(800, 100)));
        // tail holds at most one hop (400), plus the new 100 samples
        assert_eq!(window.len(), 500);
        assert_eq!(window.left, ramp(400, 500));
    }
}
