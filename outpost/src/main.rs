//! The `outpost` binary: `outpost server` runs the ingestion server,
//! `outpost agent` the collection agent.

use outpost_agent::alloc::CountingAllocator;

mod cli;
mod cliapp;
mod setup;

// Feeds the agent's allocator gauges; harmless for the server.
#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };

    std::process::exit(exit_code);
}
