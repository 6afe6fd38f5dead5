use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub type Level = u32;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[serde(
        alias = "Executive Director",
        alias = "executiveDirector",
        alias = "executive_director"
    )]
    ExecutiveDirector,
    #[serde(alias = "QB")]
    Qb,
    #[serde(alias = "Coach")]
    Coach,
    #[serde(alias = "Operations")]
    Operations,
    #[serde(alias = "Platform")]
    Platform,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::ExecutiveDirector,
        Role::Qb,
        Role::Coach,
        Role::Operations,
        Role::Platform,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Role::ExecutiveDirector => "Executive Director",
            Role::Qb => "QB",
            Role::Coach => "Coach",
            Role::Operations => "Operations",
            Role::Platform => "Platform",
        }
    }

    pub fn from_label(label: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.label() == label)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub type RoleSplit = BTreeMap<Role, f64>;
pub type AthleteCounts = BTreeMap<Level, u32>;
pub type ProgramFees = BTreeMap<Level, f64>;
pub type MonthlyFees = BTreeMap<Level, [f64; 3]>;
pub type AssignmentHours = BTreeMap<(Level, Role), f64>;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRate {
    pub hourly_rate: f64,
    pub is_one_time: bool,
    pub one_time_cost: f64,
}

pub type RateTable = BTreeMap<Role, RoleRate>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCapacity {
    pub headcount: u32,
    pub max_hours_per_week: f64,
    pub hours_per_athlete: BTreeMap<Level, f64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CostModel {
    Split,
    HoursRate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RevenueBasis {
    ProgramFee,
    PlatformShare,
}

#[derive(Copy, Clone, Debug)]
pub struct ModelConfig {
    pub cost_model: CostModel,
    pub revenue_basis: RevenueBasis,
    pub weeks_in_program: u32,
    pub max_weekly_hours: f64,
    pub split_total_tolerance: f64,
    pub lock_tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            cost_model: CostModel::Split,
            revenue_basis: RevenueBasis::ProgramFee,
            weeks_in_program: 12,
            max_weekly_hours: 20.0,
            split_total_tolerance: 1e-6,
            lock_tolerance: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialResult {
    pub level: Level,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub cost_breakdown: BTreeMap<Role, f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
    pub level: Level,
    pub athletes: u32,
    pub total_revenue: f64,
    pub total_cost: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityResult {
    pub role: Role,
    pub required_hours: f64,
    pub available_hours: f64,
    pub sufficient: bool,
}
