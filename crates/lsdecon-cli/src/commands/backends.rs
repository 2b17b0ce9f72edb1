//! Backend listing command.

use anyhow::Result;
use lsdecon_compute::backend::memory;
use lsdecon_compute::{describe_backends, select_best_backend};
use tracing::trace;

pub fn run(verbose: u8) -> Result<()> {
    trace!("backends::run");

    print!("{}", describe_backends());
    println!("Selected: {}", select_best_backend());

    if let Some(name) = memory::backend_override() {
        println!("LSDECON_BACKEND override: {}", name);
    }
    if verbose > 0 {
        println!("System memory: {}", memory::format_bytes(memory::system_memory()));
        println!("Memory budget: {}", memory::format_bytes(memory::available_memory()));
    }
    Ok(())
}
