use appliance_deployer::{errors, init_deployment, metrics, ApplianceConfig, DeployerEnvironmentConfig};
use log::{debug, error, info, warn};
use prometheus::Registry;

#[tokio::main]
async fn main() -> Result<(), errors::Error> {
    env_logger::init();

    let env_config = DeployerEnvironmentConfig::from_env()?;
    debug!("Environment config: {:?}", &env_config);

    // First argument overrides APPLIANCE_CONFIG_FILE
    let config_file = std::env::args().nth(1).unwrap_or_else(|| env_config.config_file.to_owned());
    info!("Loading deployment config from {}", config_file);
    let config = ApplianceConfig::load(&config_file)?;

    let registry = Registry::new();
    metrics::custom_metrics(&registry);

    let mut deployment = init_deployment(config, &env_config)?;

    let cancel = deployment.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            cancel.cancel();
        }
    });

    let result = deployment.run().await;
    match &result {
        Ok(decision) => info!("Finished: {:?}", decision),
        Err(err) => error!("Deployment failed: {}", err),
    }

    if let Some(metrics_file) = &env_config.metrics_file {
        match metrics::render(&registry) {
            Ok(text) => {
                if let Err(err) = std::fs::write(metrics_file, text) {
                    error!("Failed to write metrics to {}: {}", metrics_file.display(), err);
                }
            }
            Err(err) => error!("Failed to render metrics: {}", err),
        }
    }

    result.map(|_| ())
}
