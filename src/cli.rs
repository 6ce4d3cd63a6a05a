pub mod cli_help;
pub mod cli_main;
