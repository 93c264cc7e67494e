use serde::{Deserialize, Serialize};

/// Number of sample pairs collected per acquisition cycle.
pub const WINDOW_SIZE: usize = 100;

/// Largest value an 18-bit FIFO sample can hold.
pub const SAMPLE_MAX: u32 = 0x3FFFF;

/// One RED/IR reading taken at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SamplePair {
    pub red: u32,
    pub ir: u32,
}

impl SamplePair {
    /// Build a pair, masking both channels to 18 bits.
    pub fn new(red: u32, ir: u32) -> Self {
        Self {
            red: red & SAMPLE_MAX,
            ir: ir & SAMPLE_MAX,
        }
    }

    /// Decode one 6-byte FIFO frame: RED then IR, each 3 bytes big-endian.
    pub fn from_fifo_bytes(frame: &[u8; 6]) -> Self {
        let red = u32::from_be_bytes([0, frame[0], frame[1], frame[2]]);
        let ir = u32::from_be_bytes([0, frame[3], frame[4], frame[5]]);
        Self::new(red, ir)
    }
}

/// Fixed-capacity collection window, filled once per cycle and then reset.
///
/// The channels are only readable through [`SampleWindow::as_full`], so a
/// partially filled window never reaches the estimators.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    red: [u32; WINDOW_SIZE],
    ir: [u32; WINDOW_SIZE],
    len: usize,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleWindow {
    pub fn new() -> Self {
        Self {
            red: [0; WINDOW_SIZE],
            ir: [0; WINDOW_SIZE],
            len: 0,
        }
    }

    /// Append one pair in acquisition order.
    ///
    /// Pushing into a full window is a caller bug: it panics in debug builds
    /// and the pair is dropped in release builds.
    pub fn push(&mut self, pair: SamplePair) {
        debug_assert!(!self.is_full(), "push into a full sample window");
        if self.is_full() {
            return;
        }
        self.red[self.len] = pair.red;
        self.ir[self.len] = pair.ir;
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == WINDOW_SIZE
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// Borrow both channels once exactly `WINDOW_SIZE` pairs are present.
    pub fn as_full(&self) -> Option<FullWindow<'_>> {
        if self.is_full() {
            Some(FullWindow {
                red: &self.red,
                ir: &self.ir,
            })
        } else {
            None
        }
    }
}

/// Read-only view over a completed window, as two parallel channels.
#[derive(Debug, Clone, Copy)]
pub struct FullWindow<'a> {
    red: &'a [u32; WINDOW_SIZE],
    ir: &'a [u32; WINDOW_SIZE],
}

impl<'a> FullWindow<'a> {
    pub fn red(&self) -> &'a [u32] {
        self.red
    }

    pub fn ir(&self) -> &'a [u32] {
        self.ir
    }
}

/// Point events on a timeline (e.g. pulse peak indices)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
