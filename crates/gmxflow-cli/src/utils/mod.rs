pub mod discovery;
pub mod parser;
