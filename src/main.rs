use anyhow::Context;
use racelink::{init_logging, list_ports, Config, Station};
use std::path::PathBuf;
use std::time::Duration;

const PUMP_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!(
        "RaceLink {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATE")
    );

    let path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    if config.card_reader.port.is_none() {
        match list_ports() {
            Ok(ports) => {
                for port in ports {
                    tracing::info!("Found serial port {} ({})", port.port_name, port.description);
                }
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    let mut station = Station::new(&config);
    station.start()?;

    // give both producers time to connect before judging liveness
    station.pump(Duration::from_secs(1));
    while station.is_alive() {
        station.pump(PUMP_INTERVAL);
    }

    tracing::info!(
        "Both links stopped, {} results recorded",
        station.race().results().len()
    );
    station.shutdown(Duration::from_secs(6));
    Ok(())
}
