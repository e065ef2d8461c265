pub mod cache;
pub mod config;
pub mod enricher;
pub mod exclude;
pub mod geo;
pub mod geohash;
pub mod header_tools;
pub mod service;
mod uri_tools;
