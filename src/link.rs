//! Links between stages.
//!
//! A link is a one-sender, one-receiver wire. [`DataLink`] carries a value,
//! [`SignalLink`] carries nothing and is used as a control pulse (a grant).
//! The receiver is bound exactly once during topology construction and never
//! changes afterwards.
//!
//! Sending does not schedule anything: it produces a [`Delivery`] that the
//! topology dispatches to the receiver's handler within the same call, at
//! the same tick and phase. Transit is zero-latency; stage processing time
//! is modeled with the event queue instead.
//!
//! # Example
//!
//! ```
//! use stagesim::link::{DataLink, DataPort, Delivery};
//!
//! let mut link = DataLink::new(0, "source.data_out");
//! assert!(link.deliver(7u32).is_err()); // unbound
//!
//! link.bind(DataPort::BufferIn).unwrap();
//! match link.deliver(7u32).unwrap() {
//!     Delivery::Data { port, value, .. } => {
//!         assert_eq!(port, DataPort::BufferIn);
//!         assert_eq!(value, 7);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::types::LinkId;

/// Receiving endpoints for data links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataPort {
    /// Buffer stage's upstream data input
    BufferIn,
    /// Sink's data input
    SinkIn,
}

/// Receiving endpoints for signal links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalPort {
    /// Buffer stage's downstream grant input
    BufferGrantIn,
    /// Source's grant input
    SourceGrantIn,
}

impl fmt::Display for DataPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataPort::BufferIn => f.write_str("buffer.data_in"),
            DataPort::SinkIn => f.write_str("sink.data_in"),
        }
    }
}

impl fmt::Display for SignalPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalPort::BufferGrantIn => f.write_str("buffer.grant_in"),
            SignalPort::SourceGrantIn => f.write_str("source.grant_in"),
        }
    }
}

/// Whether a link carries a value or a bare pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Carries a typed value
    Data,
    /// Carries no payload
    Signal,
}

/// A send that must be handed to the receiving stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    /// A value for a data port
    Data {
        /// Link the value travelled on
        link: LinkId,
        /// Receiving port
        port: DataPort,
        /// The value itself
        value: T,
    },
    /// A pulse for a signal port
    Signal {
        /// Link the pulse travelled on
        link: LinkId,
        /// Receiving port
        port: SignalPort,
    },
}

impl<T> Delivery<T> {
    /// Returns the link this delivery travelled on.
    pub fn link(&self) -> LinkId {
        match self {
            Delivery::Data { link, .. } | Delivery::Signal { link, .. } => *link,
        }
    }
}

/// A link carrying values of the pipeline's item type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLink {
    id: LinkId,
    name: &'static str,
    receiver: Option<DataPort>,
}

impl DataLink {
    /// Creates an unbound data link.
    pub fn new(id: LinkId, name: &'static str) -> Self {
        Self {
            id,
            name,
            receiver: None,
        }
    }

    /// Returns the link identifier.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Returns the link name (`<sender>.<port>`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the bound receiver, if any.
    pub fn receiver(&self) -> Option<DataPort> {
        self.receiver
    }

    /// Returns true once a receiver is bound.
    pub fn is_bound(&self) -> bool {
        self.receiver.is_some()
    }

    /// Binds the receiver. A link can be bound only once.
    pub fn bind(&mut self, port: DataPort) -> SimResult<()> {
        if let Some(existing) = self.receiver {
            return Err(SimError::configuration(format!(
                "link '{}' already bound to {}",
                self.name, existing
            )));
        }
        self.receiver = Some(port);
        Ok(())
    }

    /// Builds the delivery of `value` to the bound receiver.
    pub fn deliver<T>(&self, value: T) -> SimResult<Delivery<T>> {
        let port = self.receiver.ok_or_else(|| {
            SimError::configuration(format!("send on unbound link '{}'", self.name))
        })?;
        Ok(Delivery::Data {
            link: self.id,
            port,
            value,
        })
    }

    /// Describes this link for reporting.
    pub fn desc(&self) -> LinkDesc {
        LinkDesc {
            id: self.id,
            name: self.name.to_string(),
            kind: LinkKind::Data,
            receiver: self.receiver.map(|p| p.to_string()),
        }
    }
}

/// A payload-free link used for grant pulses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalLink {
    id: LinkId,
    name: &'static str,
    receiver: Option<SignalPort>,
}

impl SignalLink {
    /// Creates an unbound signal link.
    pub fn new(id: LinkId, name: &'static str) -> Self {
        Self {
            id,
            name,
            receiver: None,
        }
    }

    /// Returns the link identifier.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Returns the link name (`<sender>.<port>`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the bound receiver, if any.
    pub fn receiver(&self) -> Option<SignalPort> {
        self.receiver
    }

    /// Returns true once a receiver is bound.
    pub fn is_bound(&self) -> bool {
        self.receiver.is_some()
    }

    /// Binds the receiver. A link can be bound only once.
    pub fn bind(&mut self, port: SignalPort) -> SimResult<()> {
        if let Some(existing) = self.receiver {
            return Err(SimError::configuration(format!(
                "link '{}' already bound to {}",
                self.name, existing
            )));
        }
        self.receiver = Some(port);
        Ok(())
    }

    /// Builds the delivery of a pulse to the bound receiver.
    pub fn deliver<T>(&self) -> SimResult<Delivery<T>> {
        let port = self.receiver.ok_or_else(|| {
            SimError::configuration(format!("pulse on unbound link '{}'", self.name))
        })?;
        Ok(Delivery::Signal {
            link: self.id,
            port,
        })
    }

    /// Describes this link for reporting.
    pub fn desc(&self) -> LinkDesc {
        LinkDesc {
            id: self.id,
            name: self.name.to_string(),
            kind: LinkKind::Signal,
            receiver: self.receiver.map(|p| p.to_string()),
        }
    }
}

/// Serializable summary of a link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDesc {
    /// Link identifier
    pub id: LinkId,
    /// Sender-side name
    pub name: String,
    /// Data or signal
    pub kind: LinkKind,
    /// Receiving port name, if bound
    pub receiver: Option<String>,
}

impl LinkDesc {
    /// Returns true if the link has a receiver.
    pub fn is_bound(&self) -> bool {
        self.receiver.is_some()
    }
}
