//! `sysflow.type.ContainerType`.

use std::fmt;
use std::str::FromStr;

use sysflow_avro::{ContractViolation, EnumAccess};

/// Container runtime that produced a container record.
///
/// Discriminants are the symbol indexes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerType {
    #[default]
    Docker = 0,
    Lxc = 1,
    LibvirtLxc = 2,
    Mesos = 3,
    Rkt = 4,
    Custom = 5,
    Cri = 6,
    Containerd = 7,
    Crio = 8,
    Bpm = 9,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown container type symbol `{0}`")]
pub struct UnknownContainerType(pub String);

impl ContainerType {
    pub const ALL: [ContainerType; 10] = [
        ContainerType::Docker,
        ContainerType::Lxc,
        ContainerType::LibvirtLxc,
        ContainerType::Mesos,
        ContainerType::Rkt,
        ContainerType::Custom,
        ContainerType::Cri,
        ContainerType::Containerd,
        ContainerType::Crio,
        ContainerType::Bpm,
    ];

    /// Symbols in wire order.
    pub const SYMBOLS: [&'static str; 10] = [
        "CT_DOCKER",
        "CT_LXC",
        "CT_LIBVIRT_LXC",
        "CT_MESOS",
        "CT_RKT",
        "CT_CUSTOM",
        "CT_CRI",
        "CT_CONTAINERD",
        "CT_CRIO",
        "CT_BPM",
    ];

    pub fn symbol(self) -> &'static str {
        Self::SYMBOLS[self as usize]
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ContainerType {
    type Err = UnknownContainerType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SYMBOLS
            .iter()
            .position(|symbol| *symbol == s)
            .map(|i| Self::ALL[i])
            .ok_or_else(|| UnknownContainerType(s.to_string()))
    }
}

impl TryFrom<usize> for ContainerType {
    type Error = ContractViolation;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ContractViolation::EnumIndex(index))
    }
}

impl EnumAccess for ContainerType {
    fn index(&self) -> usize {
        *self as usize
    }

    fn set_index(&mut self, index: usize) -> Result<(), ContractViolation> {
        *self = Self::try_from(index)?;
        Ok(())
    }
}
