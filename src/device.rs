//! hidraw device discovery and I/O

use std::fs::{File, OpenOptions, read_dir, read_to_string};
use std::io::{Read, Write};
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::error::Error;
use crate::report::{self, DeviceCommand, PRODIKEYS};

/// Largest input report the keyboard sends
const REPORT_BUFFER: usize = 64;

/// Accepts command bytes for the connected keyboard
pub trait DeviceLink: Send {
    fn send_command(&mut self, command: DeviceCommand) -> Result<(), Error>;
}

pub struct Device {
    file: File,
    path: PathBuf,
}

impl Device {
    /// Open the Prodikeys vendor interface
    pub fn open() -> Result<Self> {
        let path = find_hidraw_device()?;
        // Read+write: reports come in, command bytes go out
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// A second handle for writing commands while this one blocks on reads
    pub fn link(&self) -> Result<HidrawLink> {
        let file = self
            .file
            .try_clone()
            .with_context(|| format!("Failed to clone handle for {}", self.path.display()))?;
        Ok(HidrawLink { file })
    }

    /// Read one raw report, or None if the timeout expires first
    pub fn read_report(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let ready = {
            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
            let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
            match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(n) => n > 0,
                // Interrupted by a signal, let the caller check its flags
                Err(Errno::EINTR) => false,
                Err(e) => return Err(e).context("poll on hidraw failed"),
            }
        };
        if !ready {
            return Ok(None);
        }

        let mut buf = [0u8; REPORT_BUFFER];
        match self.file.read(&mut buf) {
            Ok(n) if n > 0 => {
                log::trace!("Report {:02x?}", &buf[..n]);
                Ok(Some(buf[..n].to_vec()))
            }
            Ok(_) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct HidrawLink {
    file: File,
}

impl DeviceLink for HidrawLink {
    fn send_command(&mut self, command: DeviceCommand) -> Result<(), Error> {
        self.file
            .write_all(&report::command_report(command))
            .map_err(|e| Error::TransportFailure {
                command,
                reason: e.to_string(),
            })
    }
}

/// Find the hidraw node for the Prodikeys vendor interface
fn find_hidraw_device() -> Result<PathBuf> {
    let target_vendor = format!("{:04X}", PRODIKEYS.vendor_id);
    let target_product = format!("{:04X}", PRODIKEYS.product_id);
    let interface_marker = format!(":1.{}/", PRODIKEYS.interface);

    for entry in read_dir("/sys/class/hidraw")? {
        let entry = entry?;
        let hidraw_name = entry.file_name();
        let device_path = entry.path().join("device");

        let Ok(uevent) = read_to_string(device_path.join("uevent")) else {
            continue;
        };
        // HID_ID=0003:0000041E:00002801
        let Some(hid_id) = uevent.lines().find_map(|l| l.strip_prefix("HID_ID=")) else {
            continue;
        };
        let parts: Vec<&str> = hid_id.split(':').collect();
        if parts.len() < 3 {
            continue;
        }
        let vendor = parts[1].trim_start_matches("0000");
        let product = parts[2].trim_start_matches("0000");
        if !vendor.eq_ignore_ascii_case(&target_vendor)
            || !product.eq_ignore_ascii_case(&target_product)
        {
            continue;
        }

        let real_path = std::fs::canonicalize(&device_path)?;
        if real_path.to_string_lossy().contains(&interface_marker) {
            return Ok(PathBuf::from(format!(
                "/dev/{}",
                hidraw_name.to_string_lossy()
            )));
        }
    }

    Err(anyhow!(
        "{} interface {} not found. Is the keyboard connected and readable?",
        PRODIKEYS.name,
        PRODIKEYS.interface
    ))
}
