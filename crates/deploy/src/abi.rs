//! Contract call values and interface metadata.

use std::fmt;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, U256},
};
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};

/// A constructor, initializer or function argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Arg {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Bytes),
}

impl Arg {
    /// Convert into a dynamic ABI value for encoding.
    pub fn to_sol(&self) -> DynSolValue {
        match self {
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Bool(value) => DynSolValue::Bool(*value),
            Self::String(value) => DynSolValue::String(value.clone()),
            Self::Bytes(value) => DynSolValue::Bytes(value.to_vec()),
        }
    }

    /// Convert a decoded ABI value back into an [`Arg`].
    pub fn from_sol(value: DynSolValue) -> Result<Self> {
        match value {
            DynSolValue::Address(address) => Ok(Self::Address(address)),
            DynSolValue::Uint(value, _) => Ok(Self::Uint(value)),
            DynSolValue::Bool(value) => Ok(Self::Bool(value)),
            DynSolValue::String(value) => Ok(Self::String(value)),
            DynSolValue::Bytes(value) => Ok(Self::Bytes(value.into())),
            DynSolValue::FixedBytes(word, size) => {
                Ok(Self::Bytes(Bytes::copy_from_slice(&word[..size])))
            }
            other => Err(DeployError::Abi(format!(
                "unsupported return value {other:?}"
            ))),
        }
    }

    pub fn as_address(&self) -> Result<Address> {
        match self {
            Self::Address(address) => Ok(*address),
            other => Err(DeployError::Abi(format!("expected an address, got {other}"))),
        }
    }

    pub fn as_uint(&self) -> Result<U256> {
        match self {
            Self::Uint(value) => Ok(*value),
            other => Err(DeployError::Abi(format!("expected a uint, got {other}"))),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "{value:?}"),
            Self::Bytes(value) => write!(f, "{value}"),
        }
    }
}

impl From<Address> for Arg {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl From<U256> for Arg {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// A function call against a contract, described by the artifact that holds its ABI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    /// Artifact name used to look up the function's ABI.
    pub contract: String,
    pub function: String,
    pub args: Vec<Arg>,
}

impl Call {
    pub fn new(contract: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.contract, self.function)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Interface description stored with a record so a later run can re-attach to the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub contract_name: String,
    pub abi: serde_json::Value,
}

/// Confirmation of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// Set when the transaction created a contract.
    pub contract_address: Option<Address>,
}
