pub mod filesystem;
pub mod memory;
pub mod parsers;
pub mod postgres;
