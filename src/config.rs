//! Device cost model configuration.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;

/// Configuration loading error.
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file access error.
    Io(io::Error),
    /// A token could not be parsed as a real number.
    Parse(String),
    /// A cost value is negative.
    Negative(&'static str, f64),
    /// The file does not contain exactly four values.
    WrongCount(usize),
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            ConfigError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ConfigError::Io(err) => write!(f, "configuration file not readable: {}", err),
            ConfigError::Parse(token) => write!(f, "configuration value '{}' is not a number", token),
            ConfigError::Negative(name, value) => {
                write!(f, "configuration cost '{}' is negative: {}", name, value)
            }
            ConfigError::WrongCount(count) => {
                write!(f, "configuration must hold exactly 4 values, found {}", count)
            }
        }
    }
}

/// Logical time costs of the simulated device, in an abstract unit.
/// Loaded once, read-only thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CostModel {
    /// Cost of reading one record.
    pub read: f64,
    /// Cost of writing one record.
    pub write: f64,
    /// Cost of moving the head by one record.
    pub shift: f64,
    /// Cost of rewinding the tape to the beginning.
    pub rewind: f64,
}

impl CostModel {
    /// Creates a cost model with the given per-operation costs.
    pub fn new(read: f64, write: f64, shift: f64, rewind: f64) -> Self {
        CostModel {
            read,
            write,
            shift,
            rewind,
        }
    }

    /// A cost model where every operation is free. Useful for untimed runs.
    pub fn free() -> Self {
        CostModel::default()
    }

    /// Loads a cost model from a file holding four whitespace-separated
    /// non-negative real numbers, in the order read, write, shift, rewind.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::parse(&content)
    }

    /// Parses a cost model from text, see [`CostModel::load`] for the format.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let tokens: Vec<&str> = content.split_whitespace().collect();
        if tokens.len() != 4 {
            return Err(ConfigError::WrongCount(tokens.len()));
        }

        let mut values = [0f64; 4];
        for (value, token) in values.iter_mut().zip(&tokens) {
            *value = token
                .parse()
                .map_err(|_| ConfigError::Parse(token.to_string()))?;
        }

        let costs = CostModel::new(values[0], values[1], values[2], values[3]);
        for (name, value) in [
            ("read", costs.read),
            ("write", costs.write),
            ("shift", costs.shift),
            ("rewind", costs.rewind),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative(name, value));
            }
        }

        return Ok(costs);
    }
}
