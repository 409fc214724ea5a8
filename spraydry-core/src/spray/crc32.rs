/// Content-defined chunking over an accumulating CRC32.
///
/// The rolling value is seeded with `initializer` and extended one byte
/// at a time; a boundary fires when it drops below `cutoff`, but only
/// once the candidate chunk has reached `min` bytes. The region behind
/// a boundary is then emitted in sub-chunks of at most `max` bytes. The
/// rolling value is never reset, and the trailing region is emitted
/// whole. File hashes depend on this exact emission structure.
pub struct Crc32Chunks<'a> {
    data: &'a [u8],
    cutoff: u32,
    min: usize,
    max: usize,
    rolling: u32,
    border: usize,
    pos: usize,
    emit_end: Option<usize>,
    exhausted: bool,
}

impl<'a> Crc32Chunks<'a> {
    pub fn new(data: &'a [u8], initializer: u32, cutoff: u32, min: usize, max: usize) -> Self {
        debug_assert!(max > 0);
        Self {
            data,
            cutoff,
            min,
            max,
            rolling: initializer,
            border: 0,
            pos: 0,
            emit_end: None,
            exhausted: false,
        }
    }

    fn roll(&mut self, byte: u8) {
        let mut crc = crc32fast::Hasher::new_with_initial(self.rolling);
        crc.update(&[byte]);
        self.rolling = crc.finalize();
    }
}

impl<'a> Iterator for Crc32Chunks<'a> {
    type Item = (u64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(end) = self.emit_end {
                if self.border < end {
                    let next = (self.border + self.max).min(end);
                    let chunk = (self.border as u64, &self.data[self.border..next]);
                    self.border = next;
                    return Some(chunk);
                }
                self.emit_end = None;
            }
            if self.exhausted {
                return None;
            }
            while self.pos < self.data.len() {
                let position = self.pos;
                self.roll(self.data[position]);
                self.pos += 1;
                if self.rolling < self.cutoff && position - self.border >= self.min {
                    self.emit_end = Some(position);
                    break;
                }
            }
            if self.emit_end.is_some() {
                continue;
            }
            self.exhausted = true;
            if self.border < self.data.len() {
                let chunk = (self.border as u64, &self.data[self.border..]);
                self.border = self.data.len();
                return Some(chunk);
            }
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        // Deterministic pseudo-random bytes, no RNG dependency.
        let mut state = 0x1234_5678_u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    fn collect(data: &[u8], cutoff: u32, min: usize, max: usize) -> Vec<(u64, Vec<u8>)> {
        Crc32Chunks::new(data, 0xfaca_de00, cutoff, min, max)
            .map(|(off, chunk)| (off, chunk.to_vec()))
            .collect()
    }

    #[test]
    fn chunks_cover_input_contiguously() {
        let data = sample(64 * 1024);
        let chunks = collect(&data, 0x000a_0000, 0x0800, 0x4000);
        let mut expect_offset = 0u64;
        let mut reassembled = Vec::new();
        for (offset, chunk) in &chunks {
            assert_eq!(*offset, expect_offset);
            expect_offset += chunk.len() as u64;
            reassembled.extend_from_slice(chunk);
        }
        assert_eq!(reassembled, data);
    }

    #[test]
    fn interior_chunks_respect_max() {
        let data = sample(256 * 1024);
        let chunks = collect(&data, 0x00f0_0000, 0x0100, 0x0400);
        for (_, chunk) in &chunks[..chunks.len().saturating_sub(1)] {
            assert!(chunk.len() <= 0x0400);
        }
    }

    #[test]
    fn zero_cutoff_never_cuts() {
        let data = sample(8 * 1024);
        let chunks = collect(&data, 0, 64, 512);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0, 0);
        assert_eq!(chunks[0].1, data);
    }

    #[test]
    fn deterministic_for_same_input() {
        let data = sample(32 * 1024);
        let first = collect(&data, 0x000a_0000, 0x0800, 0x4000);
        let second = collect(&data, 0x000a_0000, 0x0800, 0x4000);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(collect(b"", 0x000a_0000, 0x0800, 0x4000).len(), 0);
    }
}
