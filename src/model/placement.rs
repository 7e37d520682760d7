// Location: src/model/placement.rs

use std::collections::BTreeMap;

use candle_core::DType;
use serde_yaml::Value;
use tracing::warn;

use crate::config::ModelEntry;
use crate::error::{BridgeError, Result};

/// Per-device memory ceiling applied when sharding across a fixed gpu count.
pub const PER_DEVICE_MEMORY_BUDGET: &str = "8GiB";

/// Hardware targets recognized in model entry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Host CPU, full precision
    Cpu,
    /// NVIDIA accelerators
    Cuda,
    /// Apple Metal Performance Shaders
    Mps,
}

impl DeviceKind {
    /// Parse a `device` parameter value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "mps" => Ok(Self::Mps),
            other => Err(BridgeError::configuration(
                "device",
                format!("invalid device: {other}"),
            )),
        }
    }

    /// Canonical configuration spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Mps => "mps",
        }
    }
}

/// Requested accelerator count for `cuda` placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuCount {
    /// The literal token `auto`: spread across all visible accelerators
    Auto,
    /// An explicit device count
    Fixed(usize),
}

impl Default for GpuCount {
    fn default() -> Self {
        Self::Fixed(1)
    }
}

impl GpuCount {
    /// Parse a `num_gpus` parameter value. Absent means one device; the
    /// literal `auto`, an integer, or an integer-shaped string are accepted.
    pub fn parse(value: Option<&Value>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::default());
        };
        match value {
            Value::String(s) if s == "auto" => Ok(Self::Auto),
            Value::String(s) => s
                .trim()
                .parse::<usize>()
                .map(Self::Fixed)
                .map_err(|_| Self::invalid(s)),
            Value::Number(n) => n
                .as_u64()
                .map(|n| Self::Fixed(n as usize))
                .ok_or_else(|| Self::invalid(n)),
            other => Err(Self::invalid(format!("{other:?}"))),
        }
    }

    fn invalid(value: impl std::fmt::Display) -> BridgeError {
        BridgeError::configuration("num_gpus", format!("expected \"auto\" or an integer, got {value}"))
    }
}

/// How weights should be distributed across visible accelerators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMap {
    /// Let the loading collaborator place shards automatically
    Auto,
}

/// Load-time directives controlling precision and weight placement.
///
/// Computed fresh on every initialization from the main model entry; never
/// cached or persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementPlan {
    /// Target hardware kind
    pub device: DeviceKind,
    /// Weight precision to load at
    pub dtype: DType,
    /// Multi-device distribution request, if any
    pub device_map: Option<DeviceMap>,
    /// Per-device memory ceilings, indexed by device ordinal
    pub max_memory: Option<BTreeMap<usize, String>>,
    /// Move the loaded model onto the single accelerator after loading
    pub post_load_move: bool,
}

impl PlacementPlan {
    /// Derive the plan for a model entry's `device` / `num_gpus` parameters.
    ///
    /// `device` defaults to `cuda`; `num_gpus` is only consulted for cuda
    /// placement and defaults to one device.
    pub fn from_entry(entry: &ModelEntry) -> Result<Self> {
        let device = match entry.param("device") {
            None => DeviceKind::Cuda,
            Some(Value::String(s)) => DeviceKind::parse(s)?,
            Some(other) => {
                return Err(BridgeError::configuration(
                    "device",
                    format!("invalid device: {other:?}"),
                ))
            }
        };
        let num_gpus = match device {
            DeviceKind::Cuda => GpuCount::parse(entry.param("num_gpus"))?,
            _ => GpuCount::default(),
        };
        Ok(Self::build(device, num_gpus))
    }

    /// Build the directive set for a device kind and accelerator count.
    pub fn build(device: DeviceKind, num_gpus: GpuCount) -> Self {
        match device {
            DeviceKind::Cpu => Self {
                device,
                dtype: DType::F32,
                device_map: None,
                max_memory: None,
                post_load_move: false,
            },
            DeviceKind::Cuda => match num_gpus {
                GpuCount::Auto => Self {
                    device,
                    dtype: DType::F16,
                    device_map: Some(DeviceMap::Auto),
                    max_memory: None,
                    post_load_move: false,
                },
                GpuCount::Fixed(1) => Self {
                    device,
                    dtype: DType::F16,
                    device_map: None,
                    max_memory: None,
                    post_load_move: true,
                },
                GpuCount::Fixed(n) => Self {
                    device,
                    dtype: DType::F16,
                    device_map: Some(DeviceMap::Auto),
                    max_memory: Some(
                        (0..n)
                            .map(|i| (i, PER_DEVICE_MEMORY_BUDGET.to_string()))
                            .collect(),
                    ),
                    post_load_move: false,
                },
            },
            DeviceKind::Mps => {
                // Known gap: the metal backend misbehaves on some in-place ops.
                warn!("mps backend is not fully supported; generation may be unstable");
                Self {
                    device,
                    dtype: DType::F16,
                    device_map: None,
                    max_memory: None,
                    post_load_move: false,
                }
            }
        }
    }
}
