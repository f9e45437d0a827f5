pub mod wide_column;
