mod capacity;
mod catalog;
mod error;
mod export;
mod finance;
mod splits;
mod store;
mod types;

pub use capacity::{available_hours, evaluate_role, required_hours, run_capacity_model};
pub use catalog::{
    Catalog, DEFAULT_ATHLETES_PER_LEVEL, DEFAULT_HEADCOUNT, DEFAULT_MAX_HOURS_PER_WEEK,
};
pub use error::{ModelError, Result};
pub use export::{WORKBOOK_FILE_NAME, export_workbook};
pub use finance::{FinanceTables, FinancialReport, aggregate, evaluate_level, run_financial_model};
pub use splits::{NormalizeOutcome, SplitNormalizer};
pub use store::ModelStore;
pub use types::{
    AssignmentHours, AthleteCounts, CapacityResult, CostModel, FinancialResult, Level,
    LevelSummary, ModelConfig, MonthlyFees, ProgramFees, RateTable, RevenueBasis, Role,
    RoleCapacity, RoleRate, RoleSplit,
};
