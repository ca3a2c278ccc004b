use crate::device::DeviceType;

lazy_static::lazy_static! {
    /// Defaults picked up from the environment once per process.
    pub static ref DEFAULT_CONFIG: Config = Config::from_env();
}

pub const ENV_DEVICE_TYPE: &str = "CLBIND_DEVICE_TYPE";
pub const ENV_PLATFORM: &str = "CLBIND_PLATFORM";
pub const ENV_PROFILING: &str = "CLBIND_PROFILING";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Device type probed at start-up and used by `default_context`.
    pub device_type: DeviceType,
    pub platform_index: usize,
    /// Enable profiling on queues created through the service.
    pub profiling: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Gpu,
            platform_index: 0,
            profiling: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Config::default();
        if let Some(v) = lookup(ENV_DEVICE_TYPE) {
            match DeviceType::parse(&v) {
                Some(t) => config.device_type = t,
                None => log::warn!("{ENV_DEVICE_TYPE}={v:?} is not a device type, using {:?}", config.device_type),
            }
        }
        if let Some(v) = lookup(ENV_PLATFORM) {
            match v.trim().parse::<usize>() {
                Ok(i) => config.platform_index = i,
                Err(_) => log::warn!("{ENV_PLATFORM}={v:?} is not an index, using 0"),
            }
        }
        if let Some(v) = lookup(ENV_PROFILING) {
            config.profiling = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        config
    }
}

#[test]
fn config_from_lookup() {
    let config = Config::from_lookup(|key| match key {
        ENV_DEVICE_TYPE => Some("cpu".to_string()),
        ENV_PLATFORM => Some("1".to_string()),
        ENV_PROFILING => Some("on".to_string()),
        _ => None,
    });
    assert_eq!(config.device_type, DeviceType::Cpu);
    assert_eq!(config.platform_index, 1);
    assert!(config.profiling);
}

#[test]
fn bad_values_fall_back() {
    let config = Config::from_lookup(|key| match key {
        ENV_DEVICE_TYPE => Some("quantum".to_string()),
        ENV_PLATFORM => Some("-2".to_string()),
        _ => None,
    });
    assert_eq!(config, Config::default());
}
