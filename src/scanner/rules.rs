//! Per-point rules evaluated while a node is scanned
//!
//! Every rule starts open and may settle on a status partway through the node.
//! A settled rule is not evaluated again for that node; once all rules have
//! settled the scan of the node stops.

use std::ops::ControlFlow;

use serde::Serialize;

use crate::check::CheckStatus;
use crate::copc::Bounds;
use crate::las::PointRecord;

/// The rules checked against every scanned point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PointRule {
    Rgb,
    Rgbi,
    Xyz,
    GpsTime,
    SortedGpsTime,
    ReturnNumber,
}

impl PointRule {
    pub const ALL: [PointRule; 6] = [
        PointRule::Rgb,
        PointRule::Rgbi,
        PointRule::Xyz,
        PointRule::GpsTime,
        PointRule::SortedGpsTime,
        PointRule::ReturnNumber,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PointRule::Rgb => "rgb",
            PointRule::Rgbi => "rgbi",
            PointRule::Xyz => "xyz",
            PointRule::GpsTime => "gpsTime",
            PointRule::SortedGpsTime => "sortedGpsTime",
            PointRule::ReturnNumber => "returnNumber",
        }
    }

    /// Diagnostic for nodes that did not pass
    pub fn message(&self) -> &'static str {
        match self {
            PointRule::Rgb => "RGB values are all 8-bit",
            PointRule::Rgbi => "RGBI values are all 8-bit",
            PointRule::Xyz => "Points out of node bounds",
            PointRule::GpsTime => "GPS time out of range",
            PointRule::SortedGpsTime => "GPS time is not sorted",
            PointRule::ReturnNumber => "Return number exceeds number of returns",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// What the rules need to know about the node being scanned
#[derive(Debug, Clone, PartialEq)]
pub struct NodeContext {
    pub has_rgb: bool,
    pub bounds: Bounds,
    pub tolerance: [f64; 3],
    pub gps_time_range: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RuleState {
    Open,
    Settled(CheckStatus),
}

/// Final status of each rule for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleStatuses([CheckStatus; 6]);

impl RuleStatuses {
    pub fn all(status: CheckStatus) -> Self {
        Self([status; 6])
    }

    pub fn get(&self, rule: PointRule) -> CheckStatus {
        self.0[rule.index()]
    }

    pub fn set(&mut self, rule: PointRule, status: CheckStatus) {
        self.0[rule.index()] = status;
    }
}

/// Evaluates the rules over the points of one node. State is local to the
/// node: the previous GPS time is never carried between nodes.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    context: NodeContext,
    states: [RuleState; 6],
    previous_gps_time: Option<f64>,
}

impl RuleEvaluator {
    pub fn new(context: NodeContext) -> Self {
        let mut states = [RuleState::Open; 6];
        if !context.has_rgb {
            states[PointRule::Rgb.index()] = RuleState::Settled(CheckStatus::Pass);
        }
        Self {
            context,
            states,
            previous_gps_time: None,
        }
    }

    /// Feed one point. Breaks once every rule has settled.
    pub fn observe(&mut self, point: &PointRecord) -> ControlFlow<()> {
        for rule in PointRule::ALL {
            if self.states[rule.index()] != RuleState::Open {
                continue;
            }
            if let Some(status) = self.evaluate(rule, point) {
                self.states[rule.index()] = RuleState::Settled(status);
            }
        }
        self.previous_gps_time = Some(point.gps_time);

        if self.is_settled() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    pub fn is_settled(&self) -> bool {
        self.states.iter().all(|s| *s != RuleState::Open)
    }

    fn evaluate(&self, rule: PointRule, point: &PointRecord) -> Option<CheckStatus> {
        let context = &self.context;
        match rule {
            PointRule::Rgb => point
                .rgb
                .is_some_and(|rgb| rgb.iter().any(|&c| c > 255))
                .then_some(CheckStatus::Pass),
            PointRule::Rgbi => {
                let wide_rgb = point.rgb.is_some_and(|rgb| rgb.iter().any(|&c| c > 255));
                (wide_rgb || point.intensity > 255).then_some(CheckStatus::Pass)
            }
            PointRule::Xyz => (!context
                .bounds
                .contains([point.x, point.y, point.z], context.tolerance))
            .then_some(CheckStatus::Fail),
            PointRule::GpsTime => {
                let [min, max] = context.gps_time_range;
                (point.gps_time < min || point.gps_time > max).then_some(CheckStatus::Fail)
            }
            PointRule::SortedGpsTime => self
                .previous_gps_time
                .is_some_and(|previous| point.gps_time < previous)
                .then_some(CheckStatus::Warn),
            PointRule::ReturnNumber => {
                (point.return_number > point.number_of_returns).then_some(CheckStatus::Fail)
            }
        }
    }

    /// Resolve rules that never settled: the 8-bit colour rules warn, the
    /// rest pass.
    pub fn finish(self) -> RuleStatuses {
        let mut statuses = RuleStatuses::all(CheckStatus::Pass);
        for rule in PointRule::ALL {
            let status = match self.states[rule.index()] {
                RuleState::Settled(status) => status,
                RuleState::Open => match rule {
                    PointRule::Rgb | PointRule::Rgbi => CheckStatus::Warn,
                    _ => CheckStatus::Pass,
                },
            };
            statuses.set(rule, status);
        }
        statuses
    }
}
