//! Routing table management module
//!
//! Turns custom route tables and rules into a [`RoutePlan`], a plain list of
//! operations, and applies plans through `ip`.

use std::fmt;

pub mod manager;
pub mod planner;
pub mod rules;

/// One step of a route plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `ip route delete default table <table>`, absence is not an error
    DeleteDefaultRoute { table: String },
    /// `ip route flush table <table>`
    FlushTable { table: String },
    /// `ip route replace table <table> <prefix> <next_hop>`
    ReplaceRoute {
        table: String,
        prefix: String,
        next_hop: String,
    },
    /// `ip rule flush`
    FlushRules,
    /// `ip rule add <clause>`
    AddRule { clause: String },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::DeleteDefaultRoute { table } => {
                write!(f, "route delete default table {}", table)
            }
            Operation::FlushTable { table } => write!(f, "route flush table {}", table),
            Operation::ReplaceRoute {
                table,
                prefix,
                next_hop,
            } => write!(f, "route replace table {} {} {}", table, prefix, next_hop),
            Operation::FlushRules => f.write_str("rule flush"),
            Operation::AddRule { clause } => write!(f, "rule add {}", clause),
        }
    }
}

/// Why a route table entry was skipped, or a table left empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    UnknownGateway { table: String, gateway: String },
    UnavailableGateway { table: String, gateway: String },
    UnknownTarget { table: String, target: String },
    EmptyTable { table: String },
}

impl Diagnostic {
    /// Warnings leave the plan intact, everything else dropped an entry
    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::EmptyTable { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownGateway { table, gateway } => write!(
                f,
                "invalid gateway in route table {}: {}, rule skipped",
                table, gateway
            ),
            Diagnostic::UnavailableGateway { table, gateway } => write!(
                f,
                "gateway is not available in route table {}: {}, rule skipped",
                table, gateway
            ),
            Diagnostic::UnknownTarget { table, target } => write!(
                f,
                "invalid target in route table {}: {}, rule skipped",
                table, target
            ),
            Diagnostic::EmptyTable { table } => write!(f, "no routes for table: {}", table),
        }
    }
}

/// Ordered operations plus the diagnostics collected while planning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutePlan {
    pub operations: Vec<Operation>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RoutePlan {
    /// Route operations emitted for one table
    pub fn routes_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Operation> + 'a {
        self.operations.iter().filter(move |op| {
            matches!(op, Operation::ReplaceRoute { table: t, .. } if t == table)
        })
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| !d.is_warning())
    }
}
