use dotenv::var;
use eyre::eyre;
use klcd_gpio::delay::DelayBounds;
use klcd_gpio::lcd::hd44780::driver::{PinMap, Timing};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use std::str::FromStr;

/// Which kernel interface the GPIO pins are driven through.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Backend {
    #[default]
    Gpiod,
    Sysfs,
}

impl FromStr for Backend {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpiod" | "cdev" => Ok(Backend::Gpiod),
            "sysfs" => Ok(Backend::Sysfs),
            other => Err(eyre!("Unknown GPIO backend {:?}", other)),
        }
    }
}

pub fn parse_pin_bus(pin_str: &str) -> eyre::Result<[usize; 4]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| eyre!("Invalid number of data pins"))
}

/// Reads the pin map from `KLCD_PIN_RS`, `KLCD_PIN_E` and `KLCD_PINS_DATA`. Unset variables keep
/// the BeagleBone wiring from [PinMap::default].
pub fn pin_map_from_env() -> eyre::Result<PinMap> {
    let mut pins = PinMap::default();
    if let Ok(rs) = var("KLCD_PIN_RS") {
        pins.rs = rs.trim().parse()?;
    }
    if let Ok(e) = var("KLCD_PIN_E") {
        pins.e = e.trim().parse()?;
    }
    if let Ok(data) = var("KLCD_PINS_DATA") {
        pins.data = parse_pin_bus(&data)?;
    }
    Ok(pins)
}

pub fn backend_from_env() -> eyre::Result<Backend> {
    var("KLCD_GPIO_BACKEND").map_or(Ok(Backend::default()), |backend| backend.parse())
}

pub fn gpio_chip_from_env() -> String {
    var("KLCD_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string())
}

/// Delay bounds in microseconds.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct Bounds {
    pub min_us: u64,
    pub max_us: u64,
}

impl From<Bounds> for DelayBounds {
    fn from(bounds: Bounds) -> Self {
        DelayBounds::micros(bounds.min_us, bounds.max_us)
    }
}

/// Overrides for [Timing]. Anything left out keeps its default.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub nibble_lead: Option<Bounds>,
    pub settle: Option<Bounds>,
    pub enable_pulse: Option<Bounds>,
    pub power_on: Option<Bounds>,
    pub wake_up_first: Option<Bounds>,
    pub wake_up: Option<Bounds>,
    pub function_set: Option<Bounds>,
    pub instruction: Option<Bounds>,
}

impl TimingConfig {
    pub fn apply(&self, mut timing: Timing) -> Timing {
        let overrides = [
            (self.nibble_lead, &mut timing.nibble_lead),
            (self.settle, &mut timing.settle),
            (self.enable_pulse, &mut timing.enable_pulse),
            (self.power_on, &mut timing.power_on),
            (self.wake_up_first, &mut timing.wake_up_first),
            (self.wake_up, &mut timing.wake_up),
            (self.function_set, &mut timing.function_set),
            (self.instruction, &mut timing.instruction),
        ];
        for (bounds, field) in overrides {
            if let Some(bounds) = bounds {
                *field = bounds.into();
            }
        }
        timing
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
}

impl Config {
    /// Loads the config from `KLCD_CONFIG_FILE`, or `klcd.json` if unset.
    ///
    /// A missing file is not an error, a malformed one is.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        let config_str = var_os("KLCD_CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("klcd.json"));
        Self::load_from(Path::new(config_str))
    }

    pub fn load_from(config_path: &Path) -> eyre::Result<Option<Self>> {
        if !config_path.exists() {
            debug!("No config at {:?}", config_path);
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)?;
        let reader = std::io::BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    pub fn timing(&self) -> Timing {
        self.timing.apply(Timing::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_bus_accepts_mixed_separators() {
        assert_eq!(parse_pin_bus("65, 46;26 44").unwrap(), [65, 46, 26, 44]);
        assert!(parse_pin_bus("1,2,3").is_err());
        assert!(parse_pin_bus("1,2,3,x").is_err());
    }

    #[test]
    fn backend_names() {
        assert_eq!("gpiod".parse::<Backend>().unwrap(), Backend::Gpiod);
        assert_eq!(" SYSFS ".parse::<Backend>().unwrap(), Backend::Sysfs);
        assert!("spi".parse::<Backend>().is_err());
    }

    #[test]
    fn empty_config_keeps_default_timing() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.timing(), Timing::default());
    }

    #[test]
    fn timing_overrides() {
        let config: Config = serde_json::from_str(
            r#"{ "timing": { "nibble_lead": { "min_us": 50, "max_us": 80 } } }"#,
        )
        .unwrap();
        let timing = config.timing();
        assert_eq!(timing.nibble_lead, DelayBounds::micros(50, 80));
        assert_eq!(timing.power_on, Timing::default().power_on);
    }

    #[test]
    fn missing_config_file_is_none() {
        let path = std::env::temp_dir().join("klcd-config-that-does-not-exist.json");
        assert!(Config::load_from(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("klcd-config-{}.json", std::process::id()));
        std::fs::write(&path, "{ timing: ").unwrap();
        assert!(Config::load_from(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }
}
