mod args;
mod driver;
mod write;

pub use args::*;
pub use driver::{LcmsMapper, LcmsMapperError};
pub use write::{write_report, MapReport};
