//! Route plan generation

use crate::config::{RouteEntrySpec, RouteTableSpec};
use crate::error::TopologyError;
use crate::routing::rules::{is_literal_cidr, rule_operations, MAIN_TABLE};
use crate::routing::{Diagnostic, Operation, RoutePlan};
use crate::topology::TopologyContext;
use tracing::{debug, error, warn};

/// Builds route plans against one topology
pub struct RoutePlanner<'a> {
    topology: &'a TopologyContext,
}

impl<'a> RoutePlanner<'a> {
    pub fn new(topology: &'a TopologyContext) -> Self {
        Self { topology }
    }

    /// Plan all custom tables and the global rule sequence.
    ///
    /// Bad entries are skipped and recorded as diagnostics; only topology
    /// errors (alias cycles) abort planning.
    pub fn plan<S: AsRef<str>>(
        &self,
        tables: &[RouteTableSpec],
        rules: &[S],
    ) -> Result<RoutePlan, TopologyError> {
        let mut plan = RoutePlan::default();

        plan.operations.push(Operation::DeleteDefaultRoute {
            table: MAIN_TABLE.to_string(),
        });

        for table in tables {
            self.plan_table(table, &mut plan)?;
        }

        plan.operations.extend(rule_operations(rules));
        Ok(plan)
    }

    fn plan_table(&self, table: &RouteTableSpec, plan: &mut RoutePlan) -> Result<(), TopologyError> {
        plan.operations.push(Operation::FlushTable {
            table: table.table.clone(),
        });

        let mut routes = 0;
        for entry in &table.entries {
            match self.plan_entry(&table.table, entry)? {
                Ok(operations) => {
                    routes += operations.len();
                    plan.operations.extend(operations);
                }
                Err(diagnostic) => {
                    error!("{}", diagnostic);
                    plan.diagnostics.push(diagnostic);
                }
            }
        }

        if routes == 0 {
            // the flush above already left the table empty
            let diagnostic = Diagnostic::EmptyTable {
                table: table.table.clone(),
            };
            warn!("{}", diagnostic);
            plan.diagnostics.push(diagnostic);
        } else {
            debug!("Planned {} routes for table {}", routes, table.table);
        }
        Ok(())
    }

    /// Outer error aborts the run, inner error skips the entry
    fn plan_entry(
        &self,
        table: &str,
        entry: &RouteEntrySpec,
    ) -> Result<Result<Vec<Operation>, Diagnostic>, TopologyError> {
        let Some(gateway) = self.topology.gateways.resolve(&entry.gateway)? else {
            return Ok(Err(Diagnostic::UnknownGateway {
                table: table.to_string(),
                gateway: entry.gateway.clone(),
            }));
        };

        if !gateway.available {
            return Ok(Err(Diagnostic::UnavailableGateway {
                table: table.to_string(),
                gateway: entry.gateway.clone(),
            }));
        }

        let next_hop = gateway.next_hop_spec();
        let route = |prefix: &str| Operation::ReplaceRoute {
            table: table.to_string(),
            prefix: prefix.to_string(),
            next_hop: next_hop.clone(),
        };

        if is_literal_cidr(&entry.target) {
            return Ok(Ok(vec![route(&entry.target)]));
        }

        match self.topology.netzones.get(&entry.target) {
            Some(zone) => Ok(Ok(zone.cidrs.iter().map(|cidr| route(cidr)).collect())),
            None => Ok(Err(Diagnostic::UnknownTarget {
                table: table.to_string(),
                target: entry.target.clone(),
            })),
        }
    }
}
