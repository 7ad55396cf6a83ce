use std::process;

mod headless;
mod logging;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match headless::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("gizmo: {err}");
            headless::print_help();
            process::exit(2);
        }
    };

    logging::setup_tracing(parsed.log_level);
    tracing::info!("gizmo starting");

    if let Err(err) = headless::run(&parsed) {
        eprintln!("replay error: {err}");
        process::exit(1);
    }
}
