use chapel_votes::config::Config;
use log::{error, info, LevelFilter};
use rocket::{Error as RocketError, Ignite, Rocket};
use thiserror::Error;

/// Errors that are critical to the entire server.
#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    RocketError(#[from] RocketError),
}

/// Summarise what the ignited server is about to serve.
fn log_service(rocket: &Rocket<Ignite>) {
    let routes = rocket.routes().count();
    match rocket.state::<Config>() {
        Some(config) => info!(
            "Serving {routes} voting routes; reconciling every {}s",
            config.reconcile_interval().as_secs()
        ),
        None => info!("Serving {routes} voting routes"),
    }
}

async fn run() -> Result<(), Error> {
    info!("Configuring voting service...");
    let rocket = chapel_votes::build().ignite().await?;
    info!("...voting service configured!");
    log_service(&rocket);
    let protocol = rocket
        .config()
        .tls_enabled()
        .then(|| "https")
        .unwrap_or("http");
    let ip = &rocket.config().address;
    let port = &rocket.config().port;
    info!("Voting service launched on {protocol}://{ip}:{port}");
    // Disable rocket logging from now on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    let _ = rocket.launch().await?;
    info!("Voting service shut down");
    Ok(())
}

#[rocket::main]
async fn main() {
    // Set up logging.
    log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers())
        .expect("Failed to initialise logging");
    info!("Initialised logging");

    // Launch server.
    if let Err(err) = run().await {
        error!("{err}");
        error!("Critical failure, shutting down");
        std::process::exit(1)
    }
}
