// Text DSLs for mapping columns and setting visual options from the command line

pub mod lexer;
pub mod mapping;
pub mod options;

pub use mapping::{parse_mapping, Binding};
pub use options::parse_options;
