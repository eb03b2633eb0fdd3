use mediaduct_api::setup::{initialize_app, server::start_server};
use mediaduct_core::config::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    let (router, state) = initialize_app(&config).await?;
    start_server(&config, router, state).await?;
    Ok(())
}
