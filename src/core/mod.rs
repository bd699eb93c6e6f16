pub mod config;
pub mod errors;
pub mod lumi_doc;
pub mod types;
