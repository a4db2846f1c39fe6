use std::process::ExitCode;

fn main() -> ExitCode {
    let _logger = match wavecal::app::setup_logging() {
        Ok(handle) => handle,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(err.exit_code());
        }
    };

    match wavecal::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
