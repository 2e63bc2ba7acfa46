use snip_core::ShortCode;

/// Codes waiting to be flushed to storage, in arrival order.
#[derive(Debug)]
pub struct BatchAccumulator {
    pending: Vec<ShortCode>,
    max_batch_size: usize,
}

impl BatchAccumulator {
    pub fn new(max_batch_size: usize) -> Self {
        let max_batch_size = max_batch_size.max(1);
        Self {
            pending: Vec::with_capacity(max_batch_size),
            max_batch_size,
        }
    }

    /// Appends a code. Returns `true` once the batch is full.
    pub fn append(&mut self, code: ShortCode) -> bool {
        self.pending.push(code);
        self.pending.len() >= self.max_batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Takes the pending codes, leaving an empty batch behind.
    pub fn drain(&mut self) -> Vec<ShortCode> {
        std::mem::replace(&mut self.pending, Vec::with_capacity(self.max_batch_size))
    }
}
