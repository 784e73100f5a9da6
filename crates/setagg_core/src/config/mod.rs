use std::collections::HashMap;
use std::sync::LazyLock;

use setagg_error::{DbError, ErrorKind, Result, ResultExt};

pub const DEFAULT_BATCH_SIZE: usize = 2048;
pub const DEFAULT_PARTITIONS: usize = 4;

/// Configuration for running an aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateConfig {
    /// Number of partitions building partial states in parallel.
    pub partitions: usize,
    /// Max number of rows handed to a partition at once.
    pub batch_size: usize,
    /// Max number of distinct elements a single state store may hold.
    ///
    /// None for no limit.
    pub memory_limit_elements: Option<usize>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        AggregateConfig {
            partitions: DEFAULT_PARTITIONS,
            batch_size: DEFAULT_BATCH_SIZE,
            memory_limit_elements: None,
        }
    }
}

impl AggregateConfig {
    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::invalid_state(format!("Missing setting for '{name}'")))?;

        (func.set)(value, self)
    }

    pub fn get_as_string(&self, name: &str) -> Result<String> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| DbError::invalid_state(format!("Missing setting for '{name}'")))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();
        let value = def_conf.get_as_string(name)?;
        self.set_from_str(name, &value)
    }
}

struct SettingFunctions {
    set: fn(value: &str, conf: &mut AggregateConfig) -> Result<()>,
    get: fn(conf: &AggregateConfig) -> String,
}

impl SettingFunctions {
    const fn new<S: AggregateSetting>() -> Self {
        SettingFunctions {
            set: S::set_from_str as _,
            get: S::get_as_string as _,
        }
    }
}

fn insert_setting<S: AggregateSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<Partitions>(&mut map);
    insert_setting::<BatchSize>(&mut map);
    insert_setting::<MemoryLimitElements>(&mut map);

    map
});

pub trait AggregateSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_str(value: &str, conf: &mut AggregateConfig) -> Result<()>;
    fn get_as_string(conf: &AggregateConfig) -> String;
}

fn parse_usize(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .context_fn(|| format!("Invalid value '{value}' for setting '{name}'"))
        .map_err(|e| e.with_kind(ErrorKind::InvalidState))
}

fn check_range(name: &str, val: usize, min: usize, max: usize) -> Result<()> {
    if val < min {
        return Err(DbError::invalid_state(format!(
            "{name} cannot be less than {min}"
        )));
    }
    if val > max {
        return Err(DbError::invalid_state(format!(
            "{name} cannot be greater than {max}"
        )));
    }
    Ok(())
}

const MIN_PARTITION_COUNT: usize = 1;
const MAX_PARTITION_COUNT: usize = 512;

pub struct Partitions;

impl AggregateSetting for Partitions {
    const NAME: &'static str = "partitions";
    const DESCRIPTION: &'static str = "Number of partitions to use when aggregating";

    fn set_from_str(value: &str, conf: &mut AggregateConfig) -> Result<()> {
        let val = parse_usize(Self::NAME, value)?;
        check_range("Partition count", val, MIN_PARTITION_COUNT, MAX_PARTITION_COUNT)?;
        conf.partitions = val;
        Ok(())
    }

    fn get_as_string(conf: &AggregateConfig) -> String {
        conf.partitions.to_string()
    }
}

const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 8192;

pub struct BatchSize;

impl AggregateSetting for BatchSize {
    const NAME: &'static str = "batch_size";
    const DESCRIPTION: &'static str = "Desired number of rows in a batch";

    fn set_from_str(value: &str, conf: &mut AggregateConfig) -> Result<()> {
        let val = parse_usize(Self::NAME, value)?;
        check_range("Batch size", val, MIN_BATCH_SIZE, MAX_BATCH_SIZE)?;
        conf.batch_size = val;
        Ok(())
    }

    fn get_as_string(conf: &AggregateConfig) -> String {
        conf.batch_size.to_string()
    }
}

pub struct MemoryLimitElements;

impl AggregateSetting for MemoryLimitElements {
    const NAME: &'static str = "memory_limit_elements";
    const DESCRIPTION: &'static str =
        "Max number of distinct elements held by aggregate state, or 'none'";

    fn set_from_str(value: &str, conf: &mut AggregateConfig) -> Result<()> {
        if value.trim().eq_ignore_ascii_case("none") {
            conf.memory_limit_elements = None;
            return Ok(());
        }

        let val = parse_usize(Self::NAME, value)?;
        check_range("Memory limit", val, 1, usize::MAX)?;
        conf.memory_limit_elements = Some(val);
        Ok(())
    }

    fn get_as_string(conf: &AggregateConfig) -> String {
        match conf.memory_limit_elements {
            Some(limit) => limit.to_string(),
            None => "none".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_setting_exists() {
        let mut conf = AggregateConfig::default();
        conf.set_from_str("partitions", "13").unwrap();

        assert_eq!(13, conf.partitions);
        assert_eq!("13", conf.get_as_string("partitions").unwrap());
    }

    #[test]
    fn set_setting_not_exists() {
        let mut conf = AggregateConfig::default();
        let err = conf.set_from_str("hello_world", "58").unwrap_err();
        assert_eq!(ErrorKind::InvalidState, err.kind());
    }

    #[test]
    fn set_out_of_range() {
        let mut conf = AggregateConfig::default();
        conf.set_from_str("batch_size", "0").unwrap_err();
        conf.set_from_str("partitions", "1000").unwrap_err();
        assert_eq!(AggregateConfig::default(), conf);
    }

    #[test]
    fn set_not_a_number() {
        let mut conf = AggregateConfig::default();
        let err = conf.set_from_str("batch_size", "big").unwrap_err();
        assert_eq!(ErrorKind::InvalidState, err.kind());
    }

    #[test]
    fn memory_limit_none_roundtrip() {
        let mut conf = AggregateConfig::default();
        conf.set_from_str("memory_limit_elements", "100").unwrap();
        assert_eq!(Some(100), conf.memory_limit_elements);

        conf.set_from_str("memory_limit_elements", "NONE").unwrap();
        assert_eq!(None, conf.memory_limit_elements);
        assert_eq!("none", conf.get_as_string("memory_limit_elements").unwrap());
    }

    #[test]
    fn reset_setting() {
        let mut conf = AggregateConfig::default();
        conf.set_from_str("batch_size", "16").unwrap();
        conf.reset("batch_size").unwrap();
        assert_eq!(DEFAULT_BATCH_SIZE, conf.batch_size);
    }
}
