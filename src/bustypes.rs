use crate::case::{Bus, BusType};
use crate::error::{PfError, PfResult};

use itertools::Itertools;

/// Bus index lists derived from the per-bus type codes. All lists are in
/// ascending bus order; downstream mismatch and Jacobian assembly depends
/// on this ordering, not on insertion order.
#[derive(Debug, Clone)]
pub struct BusTypes {
    /// Index of the single slack bus.
    pub slack: usize,
    /// PV bus indices, ascending.
    pub pv: Vec<usize>,
    /// PQ bus indices, ascending.
    pub pq: Vec<usize>,
    /// Non-slack (PV ∪ PQ) bus indices, ascending.
    pub pvpq: Vec<usize>,
}

/// Partitions the buses into slack/PV/PQ index sets.
///
/// Exactly one slack bus must exist; anything else is a configuration
/// error.
pub fn bus_types(buses: &[Bus]) -> PfResult<BusTypes> {
    let mut slack = Vec::new();
    let mut pv = Vec::new();
    let mut pq = Vec::new();

    for (i, b) in buses.iter().enumerate() {
        match b.bus_type {
            BusType::Slack => slack.push(i),
            BusType::PV => pv.push(i),
            BusType::PQ => pq.push(i),
        }
    }

    if slack.len() != 1 {
        return Err(PfError::Config(format!(
            "expected exactly one slack bus, found {}",
            slack.len()
        )));
    }

    let pvpq = pv.iter().chain(&pq).copied().sorted().collect_vec();

    Ok(BusTypes {
        slack: slack[0],
        pv,
        pq,
        pvpq,
    })
}
