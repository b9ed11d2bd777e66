use std::process::exit;

use colored::Colorize;

fn main() {
    if let Err(e) = gatecrasher::app::run_cli() {
        eprintln!("{}", format!("ERROR: {e}").red());
        exit(1);
    }
}
