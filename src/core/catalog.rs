use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::error::{ModelError, Result};
use super::types::{
    AssignmentHours, Level, MonthlyFees, ProgramFees, RateTable, Role, RoleCapacity, RoleRate,
    RoleSplit,
};

pub const ATHLETE_LEVELS_FILE: &str = "athlete_levels.csv";
pub const PRACTITIONER_ROLES_FILE: &str = "practitioner_roles.csv";
pub const WEEKLY_ASSIGNMENTS_FILE: &str = "weekly_assignments.csv";
pub const FEE_SPLITS_FILE: &str = "fee_splits.csv";
pub const SERVICE_HOURS_FILE: &str = "service_hours.csv";

const EMBEDDED_ATHLETE_LEVELS: &str = include_str!("../../inputs/athlete_levels.csv");
const EMBEDDED_PRACTITIONER_ROLES: &str = include_str!("../../inputs/practitioner_roles.csv");
const EMBEDDED_WEEKLY_ASSIGNMENTS: &str = include_str!("../../inputs/weekly_assignments.csv");
const EMBEDDED_FEE_SPLITS: &str = include_str!("../../inputs/fee_splits.csv");
const EMBEDDED_SERVICE_HOURS: &str = include_str!("../../inputs/service_hours.csv");

pub const DEFAULT_HEADCOUNT: u32 = 2;
pub const DEFAULT_MAX_HOURS_PER_WEEK: f64 = 20.0;
pub const DEFAULT_ATHLETES_PER_LEVEL: u32 = 1;

#[derive(Debug, Clone)]
pub struct Catalog {
    pub levels: Vec<Level>,
    pub program_fees: ProgramFees,
    pub monthly_fees: MonthlyFees,
    pub rates: RateTable,
    pub weekly_hours: AssignmentHours,
    pub default_splits: BTreeMap<Level, RoleSplit>,
    pub service_hours: BTreeMap<Role, BTreeMap<Level, f64>>,
}

#[derive(Debug, Deserialize)]
struct LevelRow {
    #[serde(rename = "Level")]
    level: Level,
    #[serde(rename = "Program_Fee")]
    program_fee: f64,
    #[serde(rename = "Monthly_Fee_M1")]
    monthly_fee_m1: f64,
    #[serde(rename = "Monthly_Fee_M2")]
    monthly_fee_m2: f64,
    #[serde(rename = "Monthly_Fee_M3")]
    monthly_fee_m3: f64,
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    #[serde(rename = "Role")]
    role: String,
    #[serde(rename = "Hourly_Rate")]
    hourly_rate: f64,
    #[serde(rename = "Is_OneTime")]
    is_one_time: bool,
    #[serde(rename = "One_Time_Cost")]
    one_time_cost: f64,
}

#[derive(Debug, Deserialize)]
struct AssignmentRow {
    #[serde(rename = "Level")]
    level: Level,
    #[serde(rename = "Role")]
    role: String,
    #[serde(rename = "Hours_per_Week")]
    hours_per_week: f64,
}

#[derive(Debug, Deserialize)]
struct SplitRow {
    #[serde(rename = "Level")]
    level: Level,
    #[serde(rename = "Role")]
    role: String,
    #[serde(rename = "Percentage")]
    percentage: f64,
}

#[derive(Debug, Deserialize)]
struct ServiceHoursRow {
    #[serde(rename = "Role")]
    role: String,
    #[serde(rename = "Level")]
    level: Level,
    #[serde(rename = "Hours_per_Athlete")]
    hours_per_athlete: f64,
}

impl Catalog {
    pub fn embedded() -> Result<Self> {
        Self::from_sources(
            EMBEDDED_ATHLETE_LEVELS,
            EMBEDDED_PRACTITIONER_ROLES,
            EMBEDDED_WEEKLY_ASSIGNMENTS,
            EMBEDDED_FEE_SPLITS,
            EMBEDDED_SERVICE_HOURS,
        )
    }

    pub fn load_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<String> { Ok(fs::read_to_string(dir.join(name))?) };
        Self::from_sources(
            &read(ATHLETE_LEVELS_FILE)?,
            &read(PRACTITIONER_ROLES_FILE)?,
            &read(WEEKLY_ASSIGNMENTS_FILE)?,
            &read(FEE_SPLITS_FILE)?,
            &read(SERVICE_HOURS_FILE)?,
        )
    }

    fn from_sources(
        athlete_levels: &str,
        practitioner_roles: &str,
        weekly_assignments: &str,
        fee_splits: &str,
        service_hours: &str,
    ) -> Result<Self> {
        let mut levels = Vec::new();
        let mut program_fees = ProgramFees::new();
        let mut monthly_fees = MonthlyFees::new();
        for row in read_rows::<LevelRow>(athlete_levels)? {
            if levels.contains(&row.level) {
                return Err(invalid(
                    ATHLETE_LEVELS_FILE,
                    format!("duplicate level {}", row.level),
                ));
            }
            ensure_amount(ATHLETE_LEVELS_FILE, "Program_Fee", row.program_fee)?;
            for (name, fee) in [
                ("Monthly_Fee_M1", row.monthly_fee_m1),
                ("Monthly_Fee_M2", row.monthly_fee_m2),
                ("Monthly_Fee_M3", row.monthly_fee_m3),
            ] {
                ensure_amount(ATHLETE_LEVELS_FILE, name, fee)?;
            }
            levels.push(row.level);
            program_fees.insert(row.level, row.program_fee);
            monthly_fees.insert(
                row.level,
                [row.monthly_fee_m1, row.monthly_fee_m2, row.monthly_fee_m3],
            );
        }
        if levels.is_empty() {
            return Err(invalid(ATHLETE_LEVELS_FILE, "no levels defined".to_string()));
        }

        let mut rates = RateTable::new();
        for row in read_rows::<RoleRow>(practitioner_roles)? {
            let role = parse_role(PRACTITIONER_ROLES_FILE, &row.role)?;
            ensure_amount(PRACTITIONER_ROLES_FILE, "Hourly_Rate", row.hourly_rate)?;
            ensure_amount(PRACTITIONER_ROLES_FILE, "One_Time_Cost", row.one_time_cost)?;
            rates.insert(
                role,
                RoleRate {
                    hourly_rate: row.hourly_rate,
                    is_one_time: row.is_one_time,
                    one_time_cost: row.one_time_cost,
                },
            );
        }

        let mut weekly_hours = AssignmentHours::new();
        for row in read_rows::<AssignmentRow>(weekly_assignments)? {
            let role = parse_role(WEEKLY_ASSIGNMENTS_FILE, &row.role)?;
            if !levels.contains(&row.level) {
                return Err(invalid(
                    WEEKLY_ASSIGNMENTS_FILE,
                    format!("unknown level {}", row.level),
                ));
            }
            if !rates.contains_key(&role) {
                return Err(invalid(
                    WEEKLY_ASSIGNMENTS_FILE,
                    format!("role {role} has no practitioner rate"),
                ));
            }
            ensure_amount(WEEKLY_ASSIGNMENTS_FILE, "Hours_per_Week", row.hours_per_week)?;
            weekly_hours.insert((row.level, role), row.hours_per_week);
        }

        let mut default_splits: BTreeMap<Level, RoleSplit> = BTreeMap::new();
        for row in read_rows::<SplitRow>(fee_splits)? {
            let role = parse_role(FEE_SPLITS_FILE, &row.role)?;
            if !levels.contains(&row.level) {
                return Err(invalid(
                    FEE_SPLITS_FILE,
                    format!("unknown level {}", row.level),
                ));
            }
            if !(0.0..=100.0).contains(&row.percentage) {
                return Err(invalid(
                    FEE_SPLITS_FILE,
                    format!("percentage {} out of range for {role}", row.percentage),
                ));
            }
            default_splits
                .entry(row.level)
                .or_default()
                .insert(role, row.percentage);
        }
        for level in &levels {
            let split = default_splits.get(level).ok_or_else(|| {
                invalid(FEE_SPLITS_FILE, format!("no splits for level {level}"))
            })?;
            for role in Role::ALL {
                if !split.contains_key(&role) {
                    return Err(invalid(
                        FEE_SPLITS_FILE,
                        format!("level {level} has no entry for {role}"),
                    ));
                }
            }
        }

        let mut service_hours_map: BTreeMap<Role, BTreeMap<Level, f64>> = BTreeMap::new();
        for row in read_rows::<ServiceHoursRow>(service_hours)? {
            let role = parse_role(SERVICE_HOURS_FILE, &row.role)?;
            ensure_amount(SERVICE_HOURS_FILE, "Hours_per_Athlete", row.hours_per_athlete)?;
            service_hours_map
                .entry(role)
                .or_default()
                .insert(row.level, row.hours_per_athlete);
        }

        Ok(Self {
            levels,
            program_fees,
            monthly_fees,
            rates,
            weekly_hours,
            default_splits,
            service_hours: service_hours_map,
        })
    }

    pub fn default_counts(&self) -> BTreeMap<Level, u32> {
        self.levels
            .iter()
            .map(|level| (*level, DEFAULT_ATHLETES_PER_LEVEL))
            .collect()
    }

    pub fn default_capacity(&self) -> BTreeMap<Role, RoleCapacity> {
        self.service_hours
            .iter()
            .map(|(role, hours)| {
                (
                    *role,
                    RoleCapacity {
                        headcount: DEFAULT_HEADCOUNT,
                        max_hours_per_week: DEFAULT_MAX_HOURS_PER_WEEK,
                        hours_per_athlete: hours.clone(),
                    },
                )
            })
            .collect()
    }
}

fn read_rows<T: for<'de> Deserialize<'de>>(data: &str) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn parse_role(file: &str, label: &str) -> Result<Role> {
    Role::from_label(label).ok_or_else(|| invalid(file, format!("unknown role {label:?}")))
}

fn ensure_amount(file: &str, column: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(file, format!("{column} must be >= 0, got {value}")));
    }
    Ok(())
}

fn invalid(file: &str, message: String) -> ModelError {
    ModelError::InvalidTable {
        file: file.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_parses() {
        let catalog = Catalog::embedded().expect("embedded tables must parse");
        assert_eq!(catalog.levels, vec![3, 4, 5]);
        assert_eq!(catalog.program_fees[&4], 7500.0);
        assert_eq!(catalog.monthly_fees[&5], [5000.0, 5000.0, 5000.0]);
        assert_eq!(catalog.default_splits[&3][&Role::Qb], 30.0);
        assert_eq!(catalog.weekly_hours[&(4, Role::Qb)], 3.0);
        assert_eq!(catalog.service_hours[&Role::Coach][&5], 5.0);
        assert!(catalog.rates[&Role::Platform].is_one_time);
        assert_eq!(catalog.rates[&Role::Platform].one_time_cost, 500.0);
    }

    #[test]
    fn embedded_splits_total_one_hundred_per_level() {
        let catalog = Catalog::embedded().expect("embedded tables must parse");
        for level in &catalog.levels {
            let total: f64 = catalog.default_splits[level].values().sum();
            assert!((total - 100.0).abs() <= 1e-6, "level {level}: {total}");
        }
    }

    #[test]
    fn default_capacity_covers_service_roles_only() {
        let catalog = Catalog::embedded().expect("embedded tables must parse");
        let capacity = catalog.default_capacity();
        assert_eq!(
            capacity.keys().copied().collect::<Vec<_>>(),
            vec![Role::Qb, Role::Coach]
        );
        let qb = &capacity[&Role::Qb];
        assert_eq!(qb.headcount, DEFAULT_HEADCOUNT);
        assert_eq!(qb.max_hours_per_week, DEFAULT_MAX_HOURS_PER_WEEK);
        assert_eq!(qb.hours_per_athlete[&3], 0.5);
    }

    #[test]
    fn unknown_role_label_is_rejected() {
        let roles = "Role,Hourly_Rate,Is_OneTime,One_Time_Cost\nPhysio,80,false,0\n";
        let err = Catalog::from_sources(
            EMBEDDED_ATHLETE_LEVELS,
            roles,
            EMBEDDED_WEEKLY_ASSIGNMENTS,
            EMBEDDED_FEE_SPLITS,
            EMBEDDED_SERVICE_HOURS,
        )
        .expect_err("must reject unknown role");
        assert!(err.to_string().contains("unknown role"));
    }

    #[test]
    fn out_of_range_percentage_is_rejected() {
        let splits = "Level,Role,Percentage\n3,QB,130\n";
        let err = Catalog::from_sources(
            EMBEDDED_ATHLETE_LEVELS,
            EMBEDDED_PRACTITIONER_ROLES,
            EMBEDDED_WEEKLY_ASSIGNMENTS,
            splits,
            EMBEDDED_SERVICE_HOURS,
        )
        .expect_err("must reject percentage above 100");
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn incomplete_split_table_is_rejected() {
        let splits = "Level,Role,Percentage\n3,QB,100\n4,QB,100\n5,QB,100\n";
        let err = Catalog::from_sources(
            EMBEDDED_ATHLETE_LEVELS,
            EMBEDDED_PRACTITIONER_ROLES,
            EMBEDDED_WEEKLY_ASSIGNMENTS,
            splits,
            EMBEDDED_SERVICE_HOURS,
        )
        .expect_err("must reject split table missing roles");
        assert!(err.to_string().contains("no entry for"));
    }

    #[test]
    fn load_dir_fails_for_missing_directory() {
        let err = Catalog::load_dir(Path::new("does-not-exist"))
            .expect_err("missing directory must fail");
        assert!(matches!(err, ModelError::Io(_)));
    }
}
