//! Virtual keyboard using uinput for key emission

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::mem;
use std::os::unix::io::AsRawFd;

use anyhow::{Context, Result};
use evdev::Key;

use crate::output::KeyInjector;

// Linux input event types and codes
const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const SYN_REPORT: u16 = 0x00;

const BUS_USB: u16 = 0x03;

const UINPUT_IOCTL_BASE: u8 = b'U';

nix::ioctl_none!(ui_dev_create, UINPUT_IOCTL_BASE, 1);
nix::ioctl_none!(ui_dev_destroy, UINPUT_IOCTL_BASE, 2);
nix::ioctl_write_ptr!(ui_dev_setup, UINPUT_IOCTL_BASE, 3, UinputSetup);
nix::ioctl_write_int!(ui_set_evbit, UINPUT_IOCTL_BASE, 100);
nix::ioctl_write_int!(ui_set_keybit, UINPUT_IOCTL_BASE, 101);

/// input_event structure for writing events
#[repr(C)]
struct InputEvent {
    time: libc::timeval,
    type_: u16,
    code: u16,
    value: i32,
}

/// uinput_setup structure for device setup
#[repr(C)]
pub struct UinputSetup {
    id: InputId,
    name: [u8; 80],
    ff_effects_max: u32,
}

#[repr(C)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

pub struct VirtualKeyboard {
    file: File,
}

impl VirtualKeyboard {
    /// Create a virtual keyboard able to emit the given keys
    pub fn new(keys: &[Key]) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open("/dev/uinput")
            .context("Failed to open /dev/uinput")?;

        let fd = file.as_raw_fd();

        unsafe {
            ui_set_evbit(fd, EV_KEY.into()).context("Failed to set EV_KEY")?;

            for key in keys {
                ui_set_keybit(fd, key.code().into())
                    .with_context(|| format!("Failed to enable {:?}", key))?;
            }

            let mut setup: UinputSetup = mem::zeroed();
            setup.id.bustype = BUS_USB;
            setup.id.vendor = 0x1234;
            setup.id.product = 0x5679;
            setup.id.version = 1;
            let name = b"prodikeys-rs virtual keyboard";
            setup.name[..name.len()].copy_from_slice(name);

            ui_dev_setup(fd, &setup).context("Failed to setup uinput device")?;
            ui_dev_create(fd).context("Failed to create uinput device")?;
        }

        // Give udev time to create the device node
        std::thread::sleep(std::time::Duration::from_millis(100));

        Ok(Self { file })
    }

    fn emit(&mut self, type_: u16, code: u16, value: i32) -> Result<()> {
        let event = InputEvent {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            type_,
            code,
            value,
        };

        let bytes = unsafe {
            std::slice::from_raw_parts(
                &event as *const InputEvent as *const u8,
                mem::size_of::<InputEvent>(),
            )
        };

        self.file.write_all(bytes)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.emit(EV_SYN, SYN_REPORT, 0)
    }
}

impl KeyInjector for VirtualKeyboard {
    /// All transitions land in one SYN_REPORT frame
    fn inject(&mut self, events: &[(Key, bool)]) -> Result<()> {
        for &(key, pressed) in events {
            log::trace!("Key {:?} {}", key, if pressed { "down" } else { "up" });
            self.emit(EV_KEY, key.code(), i32::from(pressed))?;
        }
        self.sync()
    }
}

impl Drop for VirtualKeyboard {
    fn drop(&mut self) {
        unsafe {
            let _ = ui_dev_destroy(self.file.as_raw_fd());
        }
    }
}
