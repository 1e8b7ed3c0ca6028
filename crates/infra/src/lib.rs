//! Infrastructure layer: configuration, storage, marketplace client,
//! spreadsheet output and the workflows that tie them to the domain.

pub mod config;
pub mod export;
pub mod marketplace;
pub mod repository;
pub mod seed;
pub mod workflows;
