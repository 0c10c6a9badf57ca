use actix_web::{middleware, web, App, HttpServer};
use actix_web_prom::PrometheusMetricsBuilder;
use kserve_controller::{errors::Error, metrics, views, Config, EnvironmentConfig, ServingContext};
use kube::client::Client;
use log::{debug, info};
use prometheus::Registry;

#[actix_rt::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let env_config = envy::from_env::<EnvironmentConfig>()
        .map_err(|err| Error::Config(format!("Failed to load environment config: {}", err)))?;
    debug!("Environment config: {:?}", &env_config);
    let config = Config::from_env_config(env_config)?;
    info!("Starting with config: {:?}", config);

    let client = Client::try_default()
        .await
        .map_err(|err| Error::upstream(kserve_controller::platform::PLATFORM, err.to_string()))?;
    let context = web::Data::new(ServingContext::from_config(client, &config)?);

    let registry = Registry::new();
    metrics::custom_metrics(&registry).map_err(|err| Error::Config(format!("Failed to register metrics: {}", err)))?;
    let prometheus = PrometheusMetricsBuilder::new(metrics::METRICS_NAMESPACE)
        .registry(registry)
        .endpoint("/metrics")
        .build()
        .map_err(|err| Error::Config(format!("Failed to build metrics middleware: {}", err)))?;

    let bind_address = config.bind_address();
    info!("Listening on {}", bind_address);
    HttpServer::new(move || {
        App::new()
            .app_data(context.clone())
            .wrap(prometheus.clone())
            .wrap(middleware::Logger::default().exclude("/health").exclude("/metrics"))
            .wrap(middleware::Compress::default())
            .configure(views::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;
    Ok(())
}
