//! Command-line front end.
//!
//! A thin dispatcher over the refinement loop: commands load a treatment
//! file, call one controller operation and render the result.

pub mod commands;
pub mod context;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use serde_json::json;

/// Print a top-level error and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = json!({
            "success": false,
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}
