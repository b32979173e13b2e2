//! Liveness probe thread
//!
//! The read loop cannot tell an idle keyboard from an unplugged one, so a
//! separate thread sends the probe command periodically and tears the
//! session down when it is not accepted.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::session::{self, Session};

pub struct Watchdog {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn spawn(session: Arc<Mutex<Session>>, interval: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("liveness-probe".into())
            .spawn(move || probe_loop(&session, &rx, interval))
            .context("Failed to spawn liveness probe thread")?;

        Ok(Self {
            stop: Some(tx),
            thread: Some(thread),
        })
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        // Dropping the sender wakes the thread immediately
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn probe_loop(session: &Mutex<Session>, stop: &Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let mut session = session::lock(session);
        if !session.is_attached() {
            break;
        }
        if let Err(e) = session.probe() {
            log::warn!("Liveness probe failed: {} - closing connection", e);
            session.detach();
            break;
        }
    }
    log::debug!("Liveness probe stopped");
}
