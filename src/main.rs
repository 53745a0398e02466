//! Stagepack - module archive release bundler.
//!
//! This binary resolves versioned module archives into deterministic,
//! content-addressed release directories with a generated loader and
//! machine-readable metadata.

use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match stagepack::cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
