use std::collections::BTreeMap;

use super::catalog::Catalog;
use super::error::{ModelError, Result};
use super::finance::FinanceTables;
use super::splits::SplitNormalizer;
use super::types::{
    AssignmentHours, AthleteCounts, Level, ModelConfig, MonthlyFees, ProgramFees, RateTable, Role,
    RoleCapacity,
};

/// All editable tables for one planning session, seeded from the catalog and
/// mutated only through the clamped editor operations below.
#[derive(Debug, Clone)]
pub struct ModelStore {
    levels: Vec<Level>,
    counts: AthleteCounts,
    program_fees: ProgramFees,
    monthly_fees: MonthlyFees,
    rates: RateTable,
    weekly_hours: AssignmentHours,
    capacity: BTreeMap<Role, RoleCapacity>,
    splits: SplitNormalizer,
    config: ModelConfig,
}

impl ModelStore {
    pub fn from_catalog(catalog: &Catalog, config: ModelConfig) -> Self {
        Self {
            levels: catalog.levels.clone(),
            counts: catalog.default_counts(),
            program_fees: catalog.program_fees.clone(),
            monthly_fees: catalog.monthly_fees.clone(),
            rates: catalog.rates.clone(),
            weekly_hours: catalog.weekly_hours.clone(),
            capacity: catalog.default_capacity(),
            splits: SplitNormalizer::new(&catalog.default_splits, &config),
            config,
        }
    }

    pub fn reset(&mut self, catalog: &Catalog) {
        *self = Self::from_catalog(catalog, self.config);
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn counts(&self) -> &AthleteCounts {
        &self.counts
    }

    pub fn program_fees(&self) -> &ProgramFees {
        &self.program_fees
    }

    pub fn monthly_fees(&self) -> &MonthlyFees {
        &self.monthly_fees
    }

    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    pub fn weekly_hours(&self) -> &AssignmentHours {
        &self.weekly_hours
    }

    pub fn capacity(&self) -> &BTreeMap<Role, RoleCapacity> {
        &self.capacity
    }

    pub fn splits(&self) -> &SplitNormalizer {
        &self.splits
    }

    pub fn splits_mut(&mut self) -> &mut SplitNormalizer {
        &mut self.splits
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn finance_tables(&self) -> FinanceTables<'_> {
        FinanceTables {
            program_fees: &self.program_fees,
            monthly_fees: &self.monthly_fees,
            rates: &self.rates,
            weekly_hours: &self.weekly_hours,
        }
    }

    pub fn set_athlete_count(&mut self, level: Level, count: u32) -> Result<()> {
        let entry = self.counts.get_mut(&level).ok_or(ModelError::MissingLevel {
            table: "athlete counts",
            level,
        })?;
        *entry = count;
        Ok(())
    }

    pub fn set_program_fee(&mut self, level: Level, fee: f64) -> Result<()> {
        let entry = self
            .program_fees
            .get_mut(&level)
            .ok_or(ModelError::MissingLevel {
                table: "program fees",
                level,
            })?;
        *entry = non_negative(fee);
        Ok(())
    }

    pub fn set_monthly_fees(&mut self, level: Level, fees: [f64; 3]) -> Result<()> {
        let entry = self
            .monthly_fees
            .get_mut(&level)
            .ok_or(ModelError::MissingLevel {
                table: "monthly fees",
                level,
            })?;
        *entry = fees.map(non_negative);
        Ok(())
    }

    pub fn set_hourly_rate(&mut self, role: Role, rate: f64) -> Result<()> {
        let entry = self.rates.get_mut(&role).ok_or(ModelError::MissingRole {
            table: "practitioner rates",
            role,
        })?;
        entry.hourly_rate = non_negative(rate);
        Ok(())
    }

    pub fn set_one_time_cost(&mut self, role: Role, is_one_time: bool, amount: f64) -> Result<()> {
        let entry = self.rates.get_mut(&role).ok_or(ModelError::MissingRole {
            table: "practitioner rates",
            role,
        })?;
        entry.is_one_time = is_one_time;
        entry.one_time_cost = non_negative(amount);
        Ok(())
    }

    pub fn set_weekly_hours(&mut self, level: Level, role: Role, hours: f64) -> Result<()> {
        if !self.levels.contains(&level) {
            return Err(ModelError::MissingLevel {
                table: "weekly assignments",
                level,
            });
        }
        let cap = self.config.max_weekly_hours;
        let entry = self
            .weekly_hours
            .get_mut(&(level, role))
            .ok_or(ModelError::MissingRole {
                table: "weekly assignments",
                role,
            })?;
        *entry = non_negative(hours).min(cap);
        Ok(())
    }

    pub fn set_headcount(&mut self, role: Role, headcount: u32) -> Result<()> {
        self.capacity_mut(role)?.headcount = headcount;
        Ok(())
    }

    pub fn set_max_hours_per_week(&mut self, role: Role, hours: f64) -> Result<()> {
        self.capacity_mut(role)?.max_hours_per_week = non_negative(hours);
        Ok(())
    }

    pub fn set_service_hours(&mut self, role: Role, level: Level, hours: f64) -> Result<()> {
        if !self.levels.contains(&level) {
            return Err(ModelError::MissingLevel {
                table: "service hours",
                level,
            });
        }
        self.capacity_mut(role)?
            .hours_per_athlete
            .insert(level, non_negative(hours));
        Ok(())
    }

    fn capacity_mut(&mut self, role: Role) -> Result<&mut RoleCapacity> {
        self.capacity.get_mut(&role).ok_or(ModelError::MissingRole {
            table: "practitioner availability",
            role,
        })
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
