use std::process::exit;

fn main() {
    if let Err(e) = orgdash::app::run_cli() {
        eprintln!("error: {e}");
        exit(1);
    }
}
