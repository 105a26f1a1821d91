//! Kodegen Bundler App Store - App Store Connect deployment.
//!
//! This binary registers, uploads, builds and submits an Apple application
//! through the App Store Connect API. Exit code 0 means every requested step
//! succeeded; any aborted step, unexpected failure or Ctrl-C exits with 1.

use kodegen_bundler_appstore::cli;
use std::backtrace::Backtrace;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("\n❌ Unexpected error: {info}");
        eprintln!("{}", Backtrace::force_capture());
    }));

    let pipeline = tokio::spawn(cli::run());

    let exit_code = tokio::select! {
        joined = pipeline => match joined {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                cli::report_error(&e);
                1
            }
            // The panic hook has already printed the message and trace
            Err(_) => 1,
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n\n⚠️  Deployment cancelled by user");
            1
        }
    };

    process::exit(exit_code);
}
