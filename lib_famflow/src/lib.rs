pub mod catalog;
pub mod compression;
pub mod config;
pub mod error;
pub mod fasta;
pub mod pipeline;
pub mod selection;
pub mod stages;
pub mod store;
pub mod tool;
