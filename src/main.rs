mod composition;
mod error;
mod host;
mod sampling;

use composition::Composition;
use host::{Driver, StdoutSink, StopHandle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sampling::SamplingEngine;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Log lines go to stderr so stdout carries only molecules
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> error::Result<()> {
    init_tracing();

    let composition = Composition::earth()?;
    info!(
        molecules_magnitude = ?composition.largest_magnitude(),
        "counting every molecule of the atmosphere, Ctrl-C to stop"
    );

    let engine = SamplingEngine::new(&composition, StdRng::from_entropy())?;
    let mut driver = Driver::new(engine, StdoutSink);

    let stop = StopHandle::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => on_signal.stop(),
            Err(err) => error!("cannot listen for Ctrl-C: {err}"),
        }
    });

    host::run(&mut driver, &stop).await?;
    info!(presented = driver.presented(), state = ?driver.state(), "done");
    Ok(())
}
