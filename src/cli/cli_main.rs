use super::cli_help::{MIN_TIME_EN_HELPER, MIN_TIME_RU_HELPER};
use crate::OptimalControl::min_time_task::{MinTimeTask, OCPError};
use crate::OptimalControl::solution::Trajectory;
use crate::OptimalControl::task_file::{ProblemFile, create_template, run};
use log::error;
use std::io::{self, BufRead, Write};
use std::path::Path;

pub fn run_interactive_menu() {
    run_menu(&mut io::stdin().lock());
}

/// menu loop over any line source; end of input leaves the menu like "0"
fn run_menu<R: BufRead>(input: &mut R) {
    loop {
        show_main_menu();
        let Some(choice) = get_user_input(input) else {
            println!("Goodbye!");
            break;
        };

        match choice.trim() {
            "1" => report(solve_default()),
            "2" => {
                let Some(path) = ask(input, "Path to the task file: ") else {
                    break;
                };
                report(solve_file(Path::new(path.trim())));
            }
            "3" => {
                let Some(path) = ask(input, "Path of the new task file [task.json]: ") else {
                    break;
                };
                let path = if path.trim().is_empty() {
                    "task.json"
                } else {
                    path.trim()
                };
                match create_template(Path::new(path)) {
                    Ok(()) => println!("Template written to {}", path),
                    Err(e) => error!("{}", e),
                }
            }
            "4" => {
                if !help_menu(input) {
                    break;
                }
            }
            "0" => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please try again."),
        }
    }
}

/* colors
Blue (\x1b[34m) - header
Yellow (\x1b[33m) - menu options
Cyan (\x1b[36m) - prompt
*/
fn show_main_menu() {
    println!(
        "\x1b[34m\n MiTOC: minimum-time optimal control of a point mass\n
    direct transcription + interior point method \n \x1b[0m"
    );
    println!("\x1b[33m1. Solve the default task\x1b[0m");
    println!("\x1b[33m2. Solve a task file\x1b[0m");
    println!("\x1b[33m3. Create a task file template\x1b[0m");
    println!("\x1b[33m4. Help\x1b[0m");
    println!("\x1b[33m0. Exit\x1b[0m");
    print!("\x1b[36mEnter your choice: \x1b[0m");
    let _ = io::stdout().flush();
}

/// false at the end of input
fn help_menu<R: BufRead>(input: &mut R) -> bool {
    println!("\x1b[33m1. English\x1b[0m");
    println!("\x1b[33m2. Русский\x1b[0m");
    let Some(language) = ask(input, "Language: ") else {
        return false;
    };
    match language.trim() {
        "2" => println!("{}", MIN_TIME_RU_HELPER),
        _ => println!("{}", MIN_TIME_EN_HELPER),
    }
    true
}

fn ask<R: BufRead>(input: &mut R, prompt: &str) -> Option<String> {
    print!("\x1b[36m{}\x1b[0m", prompt);
    let _ = io::stdout().flush();
    get_user_input(input)
}

/// one line of input, `None` at the end of input or on a read error
fn get_user_input<R: BufRead>(input: &mut R) -> Option<String> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(e) => {
            error!("failed to read input: {}", e);
            None
        }
    }
}

fn report(result: Result<Trajectory, OCPError>) {
    match result {
        Ok(trajectory) => trajectory.pretty_print_summary(),
        Err(e) => error!("{}", e),
    }
}

/// Solves the built-in default task
pub fn solve_default() -> Result<Trajectory, OCPError> {
    let problem = ProblemFile::from_task(MinTimeTask::default());
    problem.task.pretty_print_task();
    run(&problem)
}

/// Loads a task file and runs the whole pipeline
pub fn solve_file(path: &Path) -> Result<Trajectory, OCPError> {
    let problem = ProblemFile::from_file(path)?;
    problem.task.pretty_print_task();
    run(&problem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_menu_stops_at_end_of_input() {
        run_menu(&mut Cursor::new(""));
        run_menu(&mut Cursor::new("7\n4\n1\n"));
        // input ends while a path is requested
        run_menu(&mut Cursor::new("2\n"));
        run_menu(&mut Cursor::new("4\n"));
    }

    #[test]
    fn test_user_input_lines() {
        let mut input = Cursor::new("1\n0");
        assert_eq!(get_user_input(&mut input).as_deref(), Some("1\n"));
        assert_eq!(get_user_input(&mut input).as_deref(), Some("0"));
        assert_eq!(get_user_input(&mut input), None);
    }

    #[test]
    fn test_template_from_menu() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu_task.json");
        run_menu(&mut Cursor::new(format!("3\n{}\n0\n", path.display())));
        assert!(path.exists());
    }
}
