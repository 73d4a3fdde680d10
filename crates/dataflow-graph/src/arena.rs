use dataflow_core::{PortDescriptor, Value};

/// Two parallel handle-indexed arrays: the current value per port, and
/// the generation stamp of the last change of that port (spec §3/§2).
pub struct PortArena {
    values: Vec<Value>,
    generations: Vec<u64>,
}

impl PortArena {
    pub fn new(ports: &[PortDescriptor]) -> Self {
        Self {
            values: ports.iter().map(|p| p.dtype.zero()).collect(),
            generations: vec![0; ports.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn generation(&self, index: usize) -> u64 {
        self.generations[index]
    }

    /// Write a port's value and stamp its generation, unconditionally
    /// (the caller, i.e. the scheduler, decides separately whether this
    /// warrants enqueueing dependents).
    pub fn write(&mut self, index: usize, value: Value, generation: u64) {
        self.values[index] = value;
        self.generations[index] = generation;
    }
}
