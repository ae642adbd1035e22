//! File I/O utilities.

pub mod reader;

pub use reader::SessionFileReader;
