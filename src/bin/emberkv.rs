/*!
 * EmberKV Server Entry Point
 *
 * Reads configuration from the environment (and `.env` when present),
 * binds the listener, replays the append-only file into memory, then
 * serves connections until the listener fails.
 */

use anyhow::Result;
use emberkv::{Config, Server};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    // Respects RUST_LOG, e.g. RUST_LOG=debug
    env_logger::init();

    let config = Config::from_env();
    let server = Server::bind(&config)?;
    server.load_state()?;
    server.serve()?;
    Ok(())
}
