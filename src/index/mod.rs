pub mod bitmap;
pub mod memory_reader;
pub mod reader;
