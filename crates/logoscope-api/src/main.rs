use logoscope_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = logoscope_api::setup::initialize_app(config.clone()).await?;

    logoscope_api::setup::server::start_server(&config, router, state.shutdown.clone()).await?;

    Ok(())
}
