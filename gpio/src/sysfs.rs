//! SysfsGpioDriver implementation using the legacy `/sys/class/gpio` interface.
//!
//! Older kernels (and some board support packages) only expose GPIOs through sysfs. Claiming a pin
//! exports it and sets its direction, dropping the output unexports it again.
use crate::{GpioDriver, GpioError, GpioOutput, GpioResult};
use bitvec::vec::BitVec;
use log::{debug, warn};
use std::fmt::{Debug, Formatter};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU8;
use std::thread;
use std::time::{Duration, Instant};

pub struct SysfsGpioDriver {
    base_path: PathBuf,
    used_pins: BitVec<AtomicU8>,
}

impl SysfsGpioDriver {
    /// Number of GPIOs on the four banks of an AM335x, as found on the BeagleBone.
    pub const DEFAULT_COUNT: usize = 128;

    /// How long to wait for the kernel to create a pin's files after exporting it.
    pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn new(count: usize) -> GpioResult<Self> {
        Self::with_base_path("/sys/class/gpio", count)
    }

    pub fn with_base_path(base_path: impl AsRef<Path>, count: usize) -> GpioResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        if !base_path.join("export").exists() {
            return Err(GpioError::NotSupported);
        }
        Ok(SysfsGpioDriver {
            base_path,
            used_pins: BitVec::repeat(false, count),
        })
    }

    fn pin_path(&self, index: usize) -> PathBuf {
        self.base_path.join(format!("gpio{}", index))
    }

    /// Sets up a freshly exported pin as an output and opens its value file.
    fn configure_output(&self, pin_path: &Path) -> GpioResult<File> {
        // The kernel creates the pin's directory asynchronously after the export
        let direction = pin_path.join("direction");
        let started = Instant::now();
        while !direction.exists() {
            if started.elapsed() > Self::EXPORT_TIMEOUT {
                return Err(GpioError::Io(ErrorKind::TimedOut));
            }
            thread::sleep(Duration::from_millis(1));
        }

        // "low" switches the direction to output and drives the pin low in one step
        std::fs::write(direction, "low")?;
        Ok(OpenOptions::new().write(true).open(pin_path.join("value"))?)
    }

    fn unexport(&self, index: usize) {
        if let Err(err) = std::fs::write(self.base_path.join("unexport"), index.to_string()) {
            warn!("Unexporting GPIO pin {} failed: {}", index, err);
        }
    }
}

impl Debug for SysfsGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsGpioDriver({:?})", self.base_path)
    }
}

impl GpioDriver for SysfsGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.used_pins.len())
    }

    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        let pin_path = self.pin_path(index);
        if pin_path.exists() {
            return Err(GpioError::AlreadyInUse);
        }

        std::fs::write(self.base_path.join("export"), index.to_string())
            .map_err(|_| GpioError::Other(format!("exporting GPIO pin {} failed", index)))?;

        let value = match self.configure_output(&pin_path) {
            Ok(value) => value,
            Err(err) => {
                self.unexport(index);
                return Err(err);
            }
        };

        self.used_pins.set_aliased(index, true);
        debug!("{:?} exported pin {}", self, index);

        Ok(Box::new(SysfsGpioOutput {
            driver: self,
            pin_index: index,
            value,
        }))
    }
}

struct SysfsGpioOutput<'a> {
    driver: &'a SysfsGpioDriver,
    pin_index: usize,
    value: File,
}

impl Debug for SysfsGpioOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for SysfsGpioOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        let buf: &[u8] = if value { b"1" } else { b"0" };
        self.value.write_at(buf, 0)?;
        Ok(())
    }
}

impl Drop for SysfsGpioOutput<'_> {
    fn drop(&mut self) {
        self.driver.unexport(self.pin_index);
        self.driver.used_pins.set_aliased(self.pin_index, false);
    }
}
