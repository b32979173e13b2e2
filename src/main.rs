mod bindings;
mod config;
mod device;
mod error;
mod host;
mod machine;
mod midi;
mod output;
mod report;
mod session;
mod state;
#[cfg(test)]
mod testing;
mod uinput;
mod watchdog;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;

use config::Config;
use device::Device;
use host::HostActions;
use midi::VirtualPort;
use output::Dispatcher;
use session::Session;
use uinput::VirtualKeyboard;
use watchdog::Watchdog;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("prodikeys-rs starting");

    let config_path = Config::config_path()?;
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load config: {}", e);
            log::error!("Expected config at: {}", config_path.display());
            return Err(e);
        }
    };

    let keyboard = VirtualKeyboard::new(&bindings::key_codes())?;
    log::info!("Virtual keyboard created");

    let dispatcher = Dispatcher::new(
        Box::new(VirtualPort::new(&config.midi_client_name, &config.midi_port_name)),
        Box::new(keyboard),
        Box::new(HostActions::new(config.actions.clone())),
    );
    // Outlives reconnections so the virtual devices stay put
    let session = Arc::new(Mutex::new(Session::new(dispatcher)));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut reconnect_delay = Duration::from_secs(1);
    let max_reconnect_delay = Duration::from_secs(30);

    while running.load(Ordering::SeqCst) {
        let mut device = match Device::open() {
            Ok(d) => {
                log::info!("Opened device: {}", d.path().display());
                reconnect_delay = Duration::from_secs(1);
                d
            }
            Err(e) => {
                log::warn!("Device not found: {} - retrying in {:?}", e, reconnect_delay);
                thread::sleep(reconnect_delay);
                reconnect_delay = (reconnect_delay * 2).min(max_reconnect_delay);
                continue;
            }
        };

        let link = match device.link() {
            Ok(link) => link,
            Err(e) => {
                log::warn!("Failed to open command channel: {} - retrying", e);
                thread::sleep(reconnect_delay);
                continue;
            }
        };

        {
            let mut session = session::lock(&session);
            session.attach(Box::new(link));
            if config.midi_on_connect {
                if let Err(e) = session.enable_midi() {
                    log::warn!("Failed to enable MIDI on connect: {}", e);
                }
            }
        }

        let watchdog = Watchdog::spawn(Arc::clone(&session), config.probe_interval())?;

        log::info!("Ready. Listening for Prodikeys reports...");
        read_loop(&mut device, &session, &running, config.read_timeout());

        drop(watchdog);
    }

    log::info!("Shutting down");
    let mut session = session::lock(&session);
    if session.state().midi_enabled() {
        if let Err(e) = session.disable_midi() {
            log::warn!("Failed to disable MIDI on shutdown: {}", e);
        }
    }
    session.detach();
    Ok(())
}

/// Feed reports into the session until shutdown or disconnect
fn read_loop(
    device: &mut Device,
    session: &Mutex<Session>,
    running: &AtomicBool,
    timeout: Duration,
) {
    while running.load(Ordering::SeqCst) {
        match device.read_report(timeout) {
            Ok(Some(report)) => {
                let mut session = session::lock(session);
                if !session.is_attached() {
                    log::warn!("Device stopped answering - will attempt reconnection");
                    return;
                }
                let delivery = session.handle_report(&report);
                log::trace!(
                    "Report {:02x?}: {} midi, {} keys, {} failures",
                    report,
                    delivery.midi_sent,
                    delivery.keys_sent,
                    delivery.failures.len()
                );
            }
            Ok(None) => {
                if !session::lock(session).is_attached() {
                    log::warn!("Device stopped answering - will attempt reconnection");
                    return;
                }
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    log::warn!("Device disconnected: {} - will attempt reconnection", e);
                    session::lock(session).detach();
                }
                return;
            }
        }
    }
}
