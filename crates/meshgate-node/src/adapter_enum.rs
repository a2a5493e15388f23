//! Unified enum wrapping the concrete adapter types for static dispatch.

use meshgate_core::Network;
use meshgate_interfaces::{Adapter, AdapterError, MemoryAdapter, TcpAdapter};

use crate::config::{AdapterEntry, AdapterKind};
use crate::error::NodeError;

/// Wraps every concrete adapter, dispatching trait methods via match.
pub enum AnyAdapter {
    Tcp(TcpAdapter),
    Memory(MemoryAdapter),
}

/// Delegate a sync method that returns a concrete (non-opaque) type.
macro_rules! delegate_sync {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Tcp(a) => a.$method($($arg),*),
            Self::Memory(a) => a.$method($($arg),*),
        }
    };
}

/// Delegate an async method.
macro_rules! delegate_async {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Tcp(a) => a.$method($($arg),*).await,
            Self::Memory(a) => a.$method($($arg),*).await,
        }
    };
}

impl AnyAdapter {
    /// Build the adapter a config entry describes.
    pub fn from_entry(network: Network, entry: &AdapterEntry) -> Result<Self, NodeError> {
        match entry.kind()? {
            AdapterKind::Tcp => Ok(Self::Tcp(TcpAdapter::new(entry.tcp_config(network)?)?)),
            AdapterKind::Memory => {
                let name = entry
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{network}[memory]"));
                let mtu = entry.mtu.unwrap_or(meshgate_interfaces::DEFAULT_MTU);
                let (adapter, _detached) = MemoryAdapter::pair(name, network, mtu);
                Ok(Self::Memory(adapter))
            }
        }
    }

    pub fn name(&self) -> &str {
        delegate_sync!(self, name)
    }

    pub fn network(&self) -> Network {
        delegate_sync!(self, network)
    }

    pub fn mtu(&self) -> usize {
        delegate_sync!(self, mtu)
    }

    pub fn is_connected(&self) -> bool {
        delegate_sync!(self, is_connected)
    }

    pub async fn start(&self) -> Result<(), AdapterError> {
        delegate_async!(self, start)
    }

    pub async fn stop(&self) -> Result<(), AdapterError> {
        delegate_async!(self, stop)
    }

    pub async fn write_frame(&self, frame: &[u8]) -> Result<(), AdapterError> {
        delegate_async!(self, write_frame, frame)
    }

    pub async fn read_frame(&self) -> Result<Option<Vec<u8>>, AdapterError> {
        delegate_async!(self, read_frame)
    }

    pub async fn probe(&self) -> Result<(), AdapterError> {
        delegate_async!(self, probe)
    }
}

impl From<TcpAdapter> for AnyAdapter {
    fn from(adapter: TcpAdapter) -> Self {
        Self::Tcp(adapter)
    }
}

impl From<MemoryAdapter> for AnyAdapter {
    fn from(adapter: MemoryAdapter) -> Self {
        Self::Memory(adapter)
    }
}

impl std::fmt::Debug for AnyAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnyAdapter({})", self.name())
    }
}
