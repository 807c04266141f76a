//! serial-kvm host entry point.
//!
//! Wires the infrastructure devices into a [`SessionController`] and runs it
//! until the user ends the session or presses Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- TOML config, defaults on first run
//!  └─ SessionController::new()
//!  └─ connect()
//!       ├─ Ch9329Port::open   -- serial link to the CH9329 (CH340 bridge)
//!       ├─ VideoPipeline      -- UVC capture pull thread
//!       └─ InputSource::start -- shell event stream
//!  └─ run_active() loop       -- forwards input until exit or failure
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use skvm_host::application::session::{SessionController, SessionState};
use skvm_host::infrastructure::input_capture::channel::ChannelInputSource;
use skvm_host::infrastructure::serial::ch9329::Ch9329Port;
use skvm_host::infrastructure::serial::{find_ch9329_port, SerialTransport};
use skvm_host::infrastructure::storage::config::load_config;
use skvm_host::infrastructure::video::nokhwa_source::NokhwaSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("loading configuration")?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    let default_level = config.host.log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("serial-kvm host starting");

    // Resolve the serial port: explicit config entry, else USB discovery.
    let port = match config.serial.port.clone().or_else(find_ch9329_port) {
        Some(port) => port,
        None => anyhow::bail!(
            "no serial port configured and no CH340 bridge found; \
             set [serial] port in the config file"
        ),
    };
    info!("using serial port {port}");

    let baud = config.serial.baud;
    let queue_depth = config.serial.write_queue_depth;
    let write_timeout = Duration::from_millis(config.serial.write_timeout_ms);
    let device_index = config.video.device_index;

    // The shell pushes captured events through this source's injector.  The
    // headless build keeps the stream open but idle, so the session is driven
    // by video and Ctrl-C alone.
    let input = ChannelInputSource::new();
    let _injector = input.injector();

    let (mut controller, _notices) = SessionController::new(config);

    controller
        .connect(
            move || {
                let port = Ch9329Port::open(&port, baud, queue_depth, write_timeout)?;
                Ok(Arc::new(port) as Arc<dyn SerialTransport>)
            },
            Box::new(NokhwaSource::new(device_index)),
            &input,
        )
        .await
        .context("opening session")?;

    info!("session active; press Ctrl-C to exit");

    loop {
        tokio::select! {
            state = controller.run_active() => match state {
                SessionState::Suspended => {
                    // Exit button: no UI to resume from, so end the session.
                    info!("session suspended by user; disconnecting");
                    if let Err(e) = controller.disconnect().await {
                        warn!("disconnect failed: {e}");
                    }
                    break;
                }
                SessionState::Error(e) => {
                    error!("session failed: {e}");
                    if let Err(e) = controller.reset().await {
                        warn!("reset failed: {e}");
                    }
                    break;
                }
                SessionState::Idle => break,
                other => {
                    warn!("unexpected session state: {other:?}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                if let Err(e) = controller.disconnect().await {
                    warn!("disconnect failed: {e}");
                }
                break;
            }
        }
    }

    info!("serial-kvm host stopped");
    Ok(())
}
