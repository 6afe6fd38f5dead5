use std::collections::BTreeMap;

use super::error::{ModelError, Result};
use super::store::ModelStore;
use super::types::{
    AssignmentHours, CostModel, FinancialResult, Level, LevelSummary, ModelConfig, MonthlyFees,
    ProgramFees, RateTable, RevenueBasis, Role, RoleSplit,
};

/// Read-only views of the tables the financial calculator needs.
#[derive(Copy, Clone)]
pub struct FinanceTables<'a> {
    pub program_fees: &'a ProgramFees,
    pub monthly_fees: &'a MonthlyFees,
    pub rates: &'a RateTable,
    pub weekly_hours: &'a AssignmentHours,
}

#[derive(Debug, Clone)]
pub struct FinancialReport {
    pub per_athlete: Vec<FinancialResult>,
    pub summary: Vec<LevelSummary>,
}

pub fn evaluate_level(
    level: Level,
    splits: &RoleSplit,
    tables: &FinanceTables<'_>,
    config: &ModelConfig,
) -> Result<FinancialResult> {
    match config.cost_model {
        CostModel::Split => split_model(level, splits, tables, config.revenue_basis),
        CostModel::HoursRate => hours_rate_model(level, tables, config),
    }
}

fn split_model(
    level: Level,
    splits: &RoleSplit,
    tables: &FinanceTables<'_>,
    basis: RevenueBasis,
) -> Result<FinancialResult> {
    let fee = *tables
        .program_fees
        .get(&level)
        .ok_or(ModelError::MissingLevel {
            table: "program fees",
            level,
        })?;

    let revenue = match basis {
        RevenueBasis::ProgramFee => fee,
        RevenueBasis::PlatformShare => {
            let platform_pct = splits.get(&Role::Platform).copied().unwrap_or(0.0);
            fee * (platform_pct / 100.0)
        }
    };

    let cost_breakdown: BTreeMap<Role, f64> = splits
        .iter()
        .filter(|(role, _)| **role != Role::Platform)
        .map(|(role, pct)| (*role, fee * (pct / 100.0)))
        .collect();
    let cost: f64 = cost_breakdown.values().sum();

    Ok(FinancialResult {
        level,
        revenue,
        cost,
        profit: revenue - cost,
        cost_breakdown,
    })
}

fn hours_rate_model(
    level: Level,
    tables: &FinanceTables<'_>,
    config: &ModelConfig,
) -> Result<FinancialResult> {
    let monthly = tables
        .monthly_fees
        .get(&level)
        .ok_or(ModelError::MissingLevel {
            table: "monthly fees",
            level,
        })?;
    let revenue: f64 = monthly.iter().sum();

    let mut cost_breakdown: BTreeMap<Role, f64> = BTreeMap::new();

    // One-time costs apply flatly, independent of level-specific hours.
    for (role, rate) in tables.rates {
        if rate.is_one_time {
            *cost_breakdown.entry(*role).or_insert(0.0) += rate.one_time_cost;
        }
    }

    let weeks = f64::from(config.weeks_in_program);
    for ((assignment_level, role), hours) in tables.weekly_hours {
        if *assignment_level != level {
            continue;
        }
        let rate = tables.rates.get(role).ok_or(ModelError::MissingRole {
            table: "practitioner rates",
            role: *role,
        })?;
        *cost_breakdown.entry(*role).or_insert(0.0) += rate.hourly_rate * hours * weeks;
    }

    let cost: f64 = cost_breakdown.values().sum();

    Ok(FinancialResult {
        level,
        revenue,
        cost,
        profit: revenue - cost,
        cost_breakdown,
    })
}

/// Scales a per-athlete result by the enrolled count, each field
/// independently.
pub fn aggregate(per_athlete: &FinancialResult, athletes: u32) -> LevelSummary {
    let count = f64::from(athletes);
    LevelSummary {
        level: per_athlete.level,
        athletes,
        total_revenue: per_athlete.revenue * count,
        total_cost: per_athlete.cost * count,
        profit: per_athlete.profit * count,
    }
}

pub fn run_financial_model(store: &ModelStore) -> Result<FinancialReport> {
    let tables = store.finance_tables();
    let config = store.config();

    let mut per_athlete = Vec::with_capacity(store.levels().len());
    let mut summary = Vec::with_capacity(store.levels().len());
    for level in store.levels() {
        let athletes = store
            .counts()
            .get(level)
            .copied()
            .ok_or(ModelError::MissingLevel {
                table: "athlete counts",
                level: *level,
            })?;
        let result = evaluate_level(*level, store.splits().accepted(*level)?, &tables, config)?;
        summary.push(aggregate(&result, athletes));
        per_athlete.push(result);
    }

    Ok(FinancialReport {
        per_athlete,
        summary,
    })
}
