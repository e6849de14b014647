pub mod agg;
pub mod config;
pub mod sample;
