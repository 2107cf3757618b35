pub mod fba_results;
pub mod harness;
pub mod path_tables;
