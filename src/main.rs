use pixelvault::config::{Cli, Config};
use pixelvault::error::CoreError;

#[tokio::main]
async fn main() {
    let config = Config::from_args(&Cli::from_env());

    if let Err(e) = pixelvault::run(config).await {
        eprintln!("fatal error: {}", e);
        std::process::exit(startup_exit_code(&e));
    }
}

/// Exit-code taxonomy: the numeric error-kind code under Windows, -1
/// under Unix, for a fatal startup failure reaching `main`.
fn startup_exit_code(error: &anyhow::Error) -> i32 {
    if cfg!(windows) {
        error
            .downcast_ref::<CoreError>()
            .map(CoreError::exit_code)
            .unwrap_or(1)
    } else {
        -1
    }
}
