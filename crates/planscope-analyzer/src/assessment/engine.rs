//! Assessment Engine - Heuristic signals for execution plans
//!
//! Assessment is pure: the same plan and thresholds always produce the same
//! [`Assessment`].

use crate::explain::{ExecutionPlan, ExecutionStep, ExecutionSummary};
use planscope_core::{PlanscopeError, Result};
use serde::{Deserialize, Serialize};

/// Qualitative level of a cost or cardinality figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Low,
    Moderate,
    High,
}

impl Tier {
    /// Classifies `value` against a moderate and a high threshold
    ///
    /// High is strictly above `high`; moderate starts at `moderate`.
    pub fn classify(value: f64, moderate: f64, high: f64) -> Self {
        if value > high {
            Self::High
        } else if value >= moderate {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Classifies a row count; both bounds are strict
    pub fn classify_count(value: u64, moderate: u64, high: u64) -> Self {
        if value > high {
            Self::High
        } else if value > moderate {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Returns the tier as a report label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
        }
    }
}

/// Whether the parent node's cost is dominated by I/O or CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoCpuBalance {
    IoBound,
    CpuBound,
    Balanced,
    /// Either component was zero or not reported
    Unknown,
}

impl IoCpuBalance {
    /// Returns the classification as a report label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IoBound => "IO_BOUND",
            Self::CpuBound => "CPU_BOUND",
            Self::Balanced => "BALANCED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns the recommendation attached to this classification
    pub fn recommendation(&self) -> Option<&'static str> {
        match self {
            Self::IoBound => Some("Consider adding indexes to reduce I/O"),
            Self::CpuBound => Some("Consider optimizing complex calculations"),
            Self::Balanced | Self::Unknown => None,
        }
    }
}

/// A flagged plan step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationWarning {
    /// A step reads a whole table
    FullTableScan {
        step_id: u32,
        object: Option<String>,
    },
    /// A sort step whose cost exceeds the sort threshold
    ExpensiveSort {
        step_id: u32,
        operation: String,
        cost: f64,
    },
}

impl OperationWarning {
    /// Returns the id of the flagged step
    pub fn step_id(&self) -> u32 {
        match self {
            Self::FullTableScan { step_id, .. } | Self::ExpensiveSort { step_id, .. } => *step_id,
        }
    }

    /// Returns a one-line description of the issue
    pub fn message(&self) -> String {
        match self {
            Self::FullTableScan { object, .. } => format!(
                "Full table scan detected on: {}",
                object.as_deref().unwrap_or("<unknown>")
            ),
            Self::ExpensiveSort { operation, cost, .. } => {
                format!("Expensive sort operation detected: {} (cost {:.0})", operation, cost)
            }
        }
    }

    /// Returns the suggested action
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::FullTableScan { .. } => "Consider adding appropriate indexes",
            Self::ExpensiveSort { .. } => "Consider adding indexes to avoid sorting",
        }
    }
}

/// Thresholds used to derive tiers and warnings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentThresholds {
    /// Cost strictly above this is HIGH
    pub cost_high: f64,
    /// Cost at or above this is MODERATE
    pub cost_moderate: f64,
    /// Cardinality strictly above this is HIGH
    pub cardinality_high: u64,
    /// Cardinality strictly above this is MODERATE
    pub cardinality_moderate: u64,
    /// I/O share strictly above this is I/O bound
    pub io_bound_ratio: f64,
    /// I/O share strictly below this is CPU bound
    pub cpu_bound_ratio: f64,
    /// Sort steps costing more than this are flagged
    pub expensive_sort_cost: f64,
}

impl Default for AssessmentThresholds {
    fn default() -> Self {
        Self {
            cost_high: 10_000.0,
            cost_moderate: 1_000.0,
            cardinality_high: 1_000_000,
            cardinality_moderate: 10_000,
            io_bound_ratio: 0.8,
            cpu_bound_ratio: 0.2,
            expensive_sort_cost: 100.0,
        }
    }
}

impl AssessmentThresholds {
    /// Creates thresholds with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cost thresholds
    pub fn with_cost(mut self, moderate: f64, high: f64) -> Self {
        self.cost_moderate = moderate;
        self.cost_high = high;
        self
    }

    /// Sets the cardinality thresholds
    pub fn with_cardinality(mut self, moderate: u64, high: u64) -> Self {
        self.cardinality_moderate = moderate;
        self.cardinality_high = high;
        self
    }

    /// Sets the I/O share bounds
    pub fn with_io_ratios(mut self, cpu_bound: f64, io_bound: f64) -> Self {
        self.cpu_bound_ratio = cpu_bound;
        self.io_bound_ratio = io_bound;
        self
    }

    /// Sets the cost above which a sort is flagged
    pub fn with_expensive_sort_cost(mut self, cost: f64) -> Self {
        self.expensive_sort_cost = cost;
        self
    }

    /// Checks that each pair of thresholds is ordered and in range
    pub fn validate(&self) -> Result<()> {
        let cost_ordered = self.cost_moderate >= 0.0 && self.cost_moderate <= self.cost_high;
        if !cost_ordered {
            return Err(PlanscopeError::Configuration(format!(
                "cost thresholds out of order: moderate {} > high {}",
                self.cost_moderate, self.cost_high
            )));
        }
        if self.cardinality_moderate > self.cardinality_high {
            return Err(PlanscopeError::Configuration(format!(
                "cardinality thresholds out of order: moderate {} > high {}",
                self.cardinality_moderate, self.cardinality_high
            )));
        }
        let ratios_valid = (0.0..=1.0).contains(&self.cpu_bound_ratio)
            && (0.0..=1.0).contains(&self.io_bound_ratio)
            && self.cpu_bound_ratio <= self.io_bound_ratio;
        if !ratios_valid {
            return Err(PlanscopeError::Configuration(format!(
                "I/O ratio bounds must satisfy 0 <= cpu_bound ({}) <= io_bound ({}) <= 1",
                self.cpu_bound_ratio, self.io_bound_ratio
            )));
        }
        if self.expensive_sort_cost.is_nan() || self.expensive_sort_cost < 0.0 {
            return Err(PlanscopeError::Configuration(
                "expensive sort cost must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Signals derived from one plan or summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Headline cost that was tiered
    pub cost: f64,
    pub cost_tier: Tier,
    /// Headline row count that was tiered
    pub cardinality: u64,
    pub cardinality_tier: Tier,
    pub balance: IoCpuBalance,
    /// I/O share of the parent node's cost, when both components are positive
    pub io_ratio: Option<f64>,
    /// Flagged steps in plan order
    pub warnings: Vec<OperationWarning>,
}

impl Assessment {
    /// Returns true if any step was flagged
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns the recommendation for the cost tier
    pub fn cost_recommendation(&self) -> Option<&'static str> {
        match self.cost_tier {
            Tier::High => Some("Consider optimizing with indexes or query rewrite"),
            Tier::Moderate => Some("Monitor performance in production"),
            Tier::Low => None,
        }
    }

    /// Returns the recommendation for the cardinality tier
    pub fn cardinality_recommendation(&self) -> Option<&'static str> {
        match self.cardinality_tier {
            Tier::High => Some("Consider adding WHERE clauses to reduce result set"),
            Tier::Moderate => Some("Review whether every returned row is needed"),
            Tier::Low => None,
        }
    }
}

/// Something the engine can assess
pub trait Assessable {
    /// Cost used for the cost tier
    fn headline_cost(&self) -> f64;

    /// Row count used for the cardinality tier
    fn headline_cardinality(&self) -> u64;

    /// I/O and CPU cost components of the parent node, if known
    fn io_cpu_costs(&self) -> Option<(f64, f64)>;

    /// Steps inspected for operation warnings
    fn steps(&self) -> &[ExecutionStep] {
        &[]
    }
}

impl Assessable for ExecutionPlan {
    fn headline_cost(&self) -> f64 {
        self.total_cost
    }

    fn headline_cardinality(&self) -> u64 {
        self.root_cardinality()
    }

    fn io_cpu_costs(&self) -> Option<(f64, f64)> {
        self.parent.map(|p| (p.io_cost, p.cpu_cost))
    }

    fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }
}

impl Assessable for ExecutionSummary {
    fn headline_cost(&self) -> f64 {
        self.estimate.cost
    }

    fn headline_cardinality(&self) -> u64 {
        self.estimate.cardinality
    }

    fn io_cpu_costs(&self) -> Option<(f64, f64)> {
        Some((self.estimate.io_cost, self.estimate.cpu_cost))
    }
}

/// Derives an [`Assessment`] from plans and summaries
#[derive(Debug, Clone, Default)]
pub struct AssessmentEngine {
    thresholds: AssessmentThresholds,
}

impl AssessmentEngine {
    /// Creates an engine with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with custom thresholds
    pub fn with_thresholds(thresholds: AssessmentThresholds) -> Self {
        Self { thresholds }
    }

    /// Returns the thresholds in use
    pub fn thresholds(&self) -> &AssessmentThresholds {
        &self.thresholds
    }

    /// Assesses a plan or summary
    pub fn assess(&self, subject: &impl Assessable) -> Assessment {
        let t = &self.thresholds;

        let cost = subject.headline_cost();
        let cardinality = subject.headline_cardinality();
        let (balance, io_ratio) = self.classify_balance(subject.io_cpu_costs());

        Assessment {
            cost,
            cost_tier: Tier::classify(cost, t.cost_moderate, t.cost_high),
            cardinality,
            cardinality_tier: Tier::classify_count(
                cardinality,
                t.cardinality_moderate,
                t.cardinality_high,
            ),
            balance,
            io_ratio,
            warnings: self.check_steps(subject.steps()),
        }
    }

    /// Classifies I/O versus CPU; only meaningful when both are positive
    pub fn classify_balance(&self, costs: Option<(f64, f64)>) -> (IoCpuBalance, Option<f64>) {
        let Some((io, cpu)) = costs.filter(|(io, cpu)| *io > 0.0 && *cpu > 0.0) else {
            return (IoCpuBalance::Unknown, None);
        };

        let ratio = io / (io + cpu);
        let balance = if ratio > self.thresholds.io_bound_ratio {
            IoCpuBalance::IoBound
        } else if ratio < self.thresholds.cpu_bound_ratio {
            IoCpuBalance::CpuBound
        } else {
            IoCpuBalance::Balanced
        };
        (balance, Some(ratio))
    }

    fn check_steps(&self, steps: &[ExecutionStep]) -> Vec<OperationWarning> {
        let mut warnings = Vec::new();
        for step in steps {
            if step.is_full_scan() {
                warnings.push(OperationWarning::FullTableScan {
                    step_id: step.id,
                    object: step.object_name.clone(),
                });
            }
            if step.is_sort() && step.cost > self.thresholds.expensive_sort_cost {
                warnings.push(OperationWarning::ExpensiveSort {
                    step_id: step.id,
                    operation: step.operation.clone(),
                    cost: step.cost,
                });
            }
        }
        warnings
    }
}
