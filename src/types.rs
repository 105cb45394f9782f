// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How many jobs of the same class may run at once.
///
/// - `Unrestricted` (default): every accepted submission starts immediately.
/// - `SingleFlight`: at most one running job per [`JobClass`]; what happens
///   to a submission that finds its class busy is [`BusyBehaviour`].
///
/// [`JobClass`]: crate::job::JobClass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    #[default]
    Unrestricted,
    SingleFlight,
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "unrestricted" => Ok(ConcurrencyPolicy::Unrestricted),
            "single_flight" => Ok(ConcurrencyPolicy::SingleFlight),
            other => Err(format!(
                "invalid policy: {other} (expected \"unrestricted\" or \"single_flight\")"
            )),
        }
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyPolicy::Unrestricted => write!(f, "unrestricted"),
            ConcurrencyPolicy::SingleFlight => write!(f, "single_flight"),
        }
    }
}

/// What single-flight does with a submission whose class is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusyBehaviour {
    /// Reject synchronously with `LaunchError::Busy`.
    #[default]
    Reject,
    /// Accept with status `Queued` and start when the class slot frees up.
    Queue,
}

impl FromStr for BusyBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(BusyBehaviour::Reject),
            "queue" => Ok(BusyBehaviour::Queue),
            other => Err(format!(
                "invalid on_busy: {other} (expected \"reject\" or \"queue\")"
            )),
        }
    }
}

impl fmt::Display for BusyBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyBehaviour::Reject => write!(f, "reject"),
            BusyBehaviour::Queue => write!(f, "queue"),
        }
    }
}

/// Label distribution across clients of a generated dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    NonIid,
    Iid,
}

impl Distribution {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Distribution::NonIid => "noniid",
            Distribution::Iid => "iid",
        }
    }
}

impl FromStr for Distribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "noniid" => Ok(Distribution::NonIid),
            "iid" => Ok(Distribution::Iid),
            other => Err(format!(
                "invalid distribution: {other} (expected \"noniid\" or \"iid\")"
            )),
        }
    }
}

/// Whether clients receive the same number of samples.
///
/// The generator script expects `-` for "not balanced".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum Balance {
    #[default]
    #[serde(rename = "-")]
    Unbalanced,
    #[serde(rename = "balance")]
    Balanced,
}

impl Balance {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Balance::Unbalanced => "-",
            Balance::Balanced => "balance",
        }
    }
}

impl FromStr for Balance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "-" | "unbalanced" => Ok(Balance::Unbalanced),
            "balance" | "balanced" => Ok(Balance::Balanced),
            other => Err(format!(
                "invalid balance: {other} (expected \"-\" or \"balance\")"
            )),
        }
    }
}

/// Partition strategy of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Dirichlet.
    #[default]
    Dir,
    /// Pathological.
    Pat,
    /// Extended Dirichlet.
    ExDir,
}

impl Partition {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Partition::Dir => "dir",
            Partition::Pat => "pat",
            Partition::ExDir => "exdir",
        }
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dir" => Ok(Partition::Dir),
            "pat" => Ok(Partition::Pat),
            "exdir" => Ok(Partition::ExDir),
            other => Err(format!(
                "invalid partition: {other} (expected \"dir\", \"pat\" or \"exdir\")"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LongtailType {
    #[default]
    Global,
    Local,
}

impl LongtailType {
    pub fn as_arg(&self) -> &'static str {
        match self {
            LongtailType::Global => "global",
            LongtailType::Local => "local",
        }
    }
}

impl FromStr for LongtailType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(LongtailType::Global),
            "local" => Ok(LongtailType::Local),
            other => Err(format!(
                "invalid longtail_type: {other} (expected \"global\" or \"local\")"
            )),
        }
    }
}
