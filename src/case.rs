use crate::bustypes::{bus_types, BusTypes};
use crate::error::PfResult;
use crate::ybus::make_ybus;

use num_complex::Complex64;

/// Bus classification for load flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// Reference bus: voltage magnitude and angle fixed, P and Q solved.
    Slack,
    /// Generator bus: P and |V| specified, Q and angle solved.
    PV,
    /// Load bus: P and Q specified, |V| and angle solved.
    PQ,
}

/// Static per-bus data. Injections are in per unit on the system base,
/// generation positive and load negative.
#[derive(Debug, Clone)]
pub struct Bus {
    pub bus_type: BusType,
    /// Specified real power injection (p.u.).
    pub p: f64,
    /// Specified reactive power injection (p.u., PQ buses only).
    pub q: f64,
    /// Voltage magnitude setpoint for slack/PV buses, initial guess for
    /// PQ buses (p.u.).
    pub vm: f64,
}

impl Bus {
    pub fn slack(vm: f64) -> Self {
        Self {
            bus_type: BusType::Slack,
            p: 0.0,
            q: 0.0,
            vm,
        }
    }

    pub fn pv(p: f64, vm: f64) -> Self {
        Self {
            bus_type: BusType::PV,
            p,
            q: 0.0,
            vm,
        }
    }

    pub fn pq(p: f64, q: f64) -> Self {
        Self {
            bus_type: BusType::PQ,
            p,
            q,
            vm: 1.0,
        }
    }
}

/// A transmission line or transformer between two buses. Bus numbers are
/// 1-based, as supplied by the network configuration; `br_b` is the total
/// line charging susceptance (zero for transformers).
#[derive(Debug, Clone)]
pub struct Branch {
    pub from_bus: usize,
    pub to_bus: usize,
    pub br_r: f64,
    pub br_x: f64,
    pub br_b: f64,
}

impl Branch {
    pub fn new(from_bus: usize, to_bus: usize, br_r: f64, br_x: f64, br_b: f64) -> Self {
        Self {
            from_bus,
            to_bus,
            br_r,
            br_x,
            br_b,
        }
    }

    /// 0-based index of the from bus.
    pub(crate) fn from_idx(&self) -> usize {
        self.from_bus - 1
    }

    /// 0-based index of the to bus.
    pub(crate) fn to_idx(&self) -> usize {
        self.to_bus - 1
    }
}

/// A load flow case: the static network configuration from which the
/// solvable model is prepared.
#[derive(Debug, Clone)]
pub struct Case {
    pub buses: Vec<Bus>,
    pub branches: Vec<Branch>,
}

impl Case {
    /// Initial voltage vector: flat start at the magnitude setpoints with
    /// all angles zero.
    pub fn v0(&self) -> Vec<Complex64> {
        self.buses
            .iter()
            .map(|b| Complex64::new(b.vm, 0.0))
            .collect()
    }

    /// The IEEE 9-bus test system (WSCC 3-machine): slack at bus 1
    /// (1.04 p.u.), PV generators at buses 2 and 3 (1.025 p.u.), loads at
    /// buses 5, 6 and 8, six lines and three step-up transformers.
    pub fn ieee9() -> Self {
        let buses = vec![
            Bus::slack(1.04),
            Bus::pv(1.63, 1.025),
            Bus::pv(0.85, 1.025),
            Bus::pq(0.0, 0.0),
            Bus::pq(-1.25, -0.50),
            Bus::pq(-0.90, -0.30),
            Bus::pq(0.0, 0.0),
            Bus::pq(-1.00, -0.35),
            Bus::pq(0.0, 0.0),
        ];
        let branches = vec![
            Branch::new(4, 5, 0.0100, 0.0850, 0.1760),
            Branch::new(4, 6, 0.0170, 0.0920, 0.1580),
            Branch::new(5, 7, 0.0320, 0.1610, 0.3060),
            Branch::new(6, 9, 0.0390, 0.1700, 0.3580),
            Branch::new(7, 8, 0.0085, 0.0720, 0.1490),
            Branch::new(8, 9, 0.0119, 0.1008, 0.2090),
            // step-up transformers, no line charging
            Branch::new(1, 4, 0.0, 0.0576, 0.0),
            Branch::new(2, 7, 0.0, 0.0625, 0.0),
            Branch::new(3, 9, 0.0, 0.0586, 0.0),
        ];
        Self { buses, branches }
    }
}

/// The prepared network model shared by all solver methods: admittance
/// matrix, specified injections and bus classification. Built once per
/// topology and read-only during solving.
pub struct PfModel {
    pub y_bus: Vec<Vec<Complex64>>,
    pub p_spec: Vec<f64>,
    pub q_spec: Vec<f64>,
    pub types: Vec<BusType>,
    pub bt: BusTypes,
    pub branches: Vec<Branch>,
}

impl PfModel {
    pub fn new(case: &Case) -> PfResult<Self> {
        let bt = bus_types(&case.buses)?;
        let y_bus = make_ybus(case.buses.len(), &case.branches)?;
        Ok(Self {
            y_bus,
            p_spec: case.buses.iter().map(|b| b.p).collect(),
            q_spec: case.buses.iter().map(|b| b.q).collect(),
            types: case.buses.iter().map(|b| b.bus_type).collect(),
            bt,
            branches: case.branches.clone(),
        })
    }

    pub fn nb(&self) -> usize {
        self.p_spec.len()
    }
}
