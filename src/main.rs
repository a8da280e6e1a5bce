use std::process;

fn main() {
    if let Err(e) = roboscript_lib::run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
