use MiTOC::Utils::logger::{init_logger, level_from_env};
use MiTOC::cli::cli_main::{run_interactive_menu, solve_file};
use log::error;
use std::path::Path;

pub fn main() {
    if let Err(e) = init_logger(level_from_env(), Some(Path::new("MiTOC.log"))) {
        eprintln!("logger could not be initialized: {}", e);
    }
    match std::env::args().nth(1) {
        Some(task_file) => match solve_file(Path::new(&task_file)) {
            Ok(trajectory) => trajectory.pretty_print_summary(),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        None => run_interactive_menu(),
    }
}
