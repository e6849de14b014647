pub mod agg;
pub mod artifacts;
pub mod bench;
pub mod cli;
pub mod logging;
pub mod model;
pub mod run;
pub mod ui;
