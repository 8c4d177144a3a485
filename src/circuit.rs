//! Circuit gating
//!
//! Named boolean gates owned outside the pipeline. The pipeline only reads them: an open
//! circuit lets the cycle through, a closed one blocks it before any generation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cycle-level gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Circuit {
    /// Master enable
    Master,
    /// Open while the display is awake; closed during sleep mode
    Sleep,
}

impl Circuit {
    pub fn as_str(self) -> &'static str {
        match self {
            Circuit::Master => "master",
            Circuit::Sleep => "sleep",
        }
    }

    /// Reason reported when this circuit blocks a cycle.
    pub fn blocked_reason(self) -> &'static str {
        match self {
            Circuit::Master => "master circuit off",
            Circuit::Sleep => "sleep mode active",
        }
    }
}

/// Read-only view of circuit state.
pub trait CircuitBoard: Send + Sync {
    fn is_circuit_open(&self, circuit: Circuit) -> bool;

    /// Whether the named provider may be called.
    fn is_provider_available(&self, provider: &str) -> bool;
}

/// In-memory circuit board. Everything starts open/available.
#[derive(Debug, Default)]
pub struct SwitchBoard {
    circuits: RwLock<HashMap<Circuit, bool>>,
    providers: RwLock<HashMap<String, bool>>,
}

impl SwitchBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_circuit(&self, circuit: Circuit, open: bool) {
        self.circuits.write().insert(circuit, open);
    }

    pub fn set_provider_available(&self, provider: impl Into<String>, available: bool) {
        self.providers.write().insert(provider.into(), available);
    }
}

impl CircuitBoard for SwitchBoard {
    fn is_circuit_open(&self, circuit: Circuit) -> bool {
        self.circuits.read().get(&circuit).copied().unwrap_or(true)
    }

    fn is_provider_available(&self, provider: &str) -> bool {
        self.providers.read().get(provider).copied().unwrap_or(true)
    }
}
