pub mod console;
pub mod markup;
pub mod mirror;
pub mod report;
pub mod screen;
