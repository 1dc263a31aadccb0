//! CSV loading of items for the sylva pipeline.

mod error;
mod item_reader;

pub use error::IoError;
pub use item_reader::ItemReader;
