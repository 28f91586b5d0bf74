pub mod fs;
pub mod xml;
pub(crate) mod zip;
