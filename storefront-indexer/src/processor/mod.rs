//! Processor module for the import pipeline.
//!
//! Turns upstream documents into the records written to the search index.

mod product_mapper;
mod record_mapper;

pub use product_mapper::ConfigurableProductMapper;
pub use record_mapper::{IdentityMapper, MapperRegistry, RecordMapper};
