mod source;
mod memory;

pub use source::{DatasetSource, DatasetSummary};
pub use memory::MemoryDataset;

#[cfg(test)]
mod tests;
