pub mod logger;
pub mod plots;
pub mod results_writer;
