//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `nodegraph_core` linkage and schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.

use nodegraph_core::db::migrations::latest_version;
use nodegraph_core::db::open_db_in_memory;
use nodegraph_core::{GraphConfig, GraphService};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("nodegraph_core ping={}", nodegraph_core::ping());
    println!("nodegraph_core version={}", nodegraph_core::core_version());
    println!("nodegraph_core schema_version={}", latest_version());

    let ready = open_db_in_memory()
        .map_err(|err| err.to_string())
        .and_then(|conn| {
            GraphService::try_new(&conn, GraphConfig::default())
                .map(|_| ())
                .map_err(|err| err.to_string())
        });
    match ready {
        Ok(()) => {
            println!("nodegraph_core storage=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("nodegraph_core storage=error error={err}");
            ExitCode::FAILURE
        }
    }
}
