use clap::ValueEnum;

pub mod dataset;
pub mod error;
pub mod harness;
pub mod layout;
pub mod report;
pub mod schema;
pub mod summary;

pub use error::{Error, Result};

use layout::{IndexedBackend, LayoutBackend, ScanBackend};

/// Layout variant to benchmark.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum LayoutVariant {
    /// Run every variant, one after another.
    #[default]
    All,
    /// Index the whole dataset at load time and answer queries from memory.
    Indexed,
    /// Walk the dataset on every query.
    Scan,
}

impl LayoutVariant {
    /// Backends selected by this variant, in run order.
    pub fn backends(self) -> Vec<Box<dyn LayoutBackend>> {
        match self {
            LayoutVariant::All => vec![Box::new(IndexedBackend), Box::new(ScanBackend)],
            LayoutVariant::Indexed => vec![Box::new(IndexedBackend)],
            LayoutVariant::Scan => vec![Box::new(ScanBackend)],
        }
    }
}
