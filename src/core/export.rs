use std::io::Write;

use zip::write::{FileOptions, ZipWriter};

use super::capacity::run_capacity_model;
use super::error::{ModelError, Result};
use super::finance::run_financial_model;
use super::store::ModelStore;

pub const WORKBOOK_FILE_NAME: &str = "Financial_Model_Snapshot.zip";

/// Serializes the current tables and derived summaries into a downloadable
/// workbook: a zip archive with one CSV sheet per table.
pub fn export_workbook(store: &ModelStore) -> Result<Vec<u8>> {
    let financial = run_financial_model(store)?;
    let capacity = run_capacity_model(store);

    let mut sheets: Vec<(&str, String)> = Vec::new();

    sheets.push((
        "Athlete Counts.csv",
        sheet(|writer| {
            writer.write_record(["Level", "Number of Athletes"])?;
            for (level, count) in store.counts() {
                writer.write_record([level.to_string(), count.to_string()])?;
            }
            Ok(())
        })?,
    ));

    sheets.push((
        "Program Fees.csv",
        sheet(|writer| {
            writer.write_record(["Level", "Program Fee per Athlete"])?;
            for (level, fee) in store.program_fees() {
                writer.write_record([level.to_string(), fee.to_string()])?;
            }
            Ok(())
        })?,
    ));

    sheets.push((
        "Monthly Fees.csv",
        sheet(|writer| {
            writer.write_record(["Level", "Month", "Monthly Fee per Athlete"])?;
            for (level, fees) in store.monthly_fees() {
                for (month, fee) in fees.iter().enumerate() {
                    writer.write_record([
                        level.to_string(),
                        (month + 1).to_string(),
                        fee.to_string(),
                    ])?;
                }
            }
            Ok(())
        })?,
    ));

    sheets.push((
        "Fee Splits.csv",
        sheet(|writer| {
            writer.write_record(["Level", "Role", "Percentage"])?;
            for level in store.levels() {
                for (role, pct) in store.splits().accepted(*level)? {
                    writer.write_record([
                        level.to_string(),
                        role.label().to_string(),
                        pct.to_string(),
                    ])?;
                }
            }
            Ok(())
        })?,
    ));

    sheets.push((
        "Practitioner Settings.csv",
        sheet(|writer| {
            writer.write_record([
                "Role",
                "Hourly_Rate",
                "Is_OneTime",
                "One_Time_Cost",
                "Headcount",
                "Max_Hours_per_Week",
            ])?;
            for (role, rate) in store.rates() {
                let availability = store.capacity().get(role);
                writer.write_record([
                    role.label().to_string(),
                    rate.hourly_rate.to_string(),
                    rate.is_one_time.to_string(),
                    rate.one_time_cost.to_string(),
                    availability.map_or(String::new(), |c| c.headcount.to_string()),
                    availability.map_or(String::new(), |c| c.max_hours_per_week.to_string()),
                ])?;
            }
            Ok(())
        })?,
    ));

    sheets.push((
        "Financial Summary.csv",
        sheet(|writer| {
            writer.write_record(["Level", "Athletes", "Total_Revenue", "Total_Cost", "Profit"])?;
            for row in &financial.summary {
                writer.write_record([
                    row.level.to_string(),
                    row.athletes.to_string(),
                    row.total_revenue.to_string(),
                    row.total_cost.to_string(),
                    row.profit.to_string(),
                ])?;
            }
            Ok(())
        })?,
    ));

    sheets.push((
        "Capacity Summary.csv",
        sheet(|writer| {
            writer.write_record(["Role", "Required_Hours", "Available_Hours", "Sufficient"])?;
            for row in &capacity {
                writer.write_record([
                    row.role.label().to_string(),
                    row.required_hours.to_string(),
                    row.available_hours.to_string(),
                    row.sufficient.to_string(),
                ])?;
            }
            Ok(())
        })?,
    ));

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in sheets {
        zip.start_file::<_, ()>(name, FileOptions::default())?;
        zip.write_all(contents.as_bytes())?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn sheet<F>(build: F) -> Result<String>
where
    F: FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<()>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    build(&mut writer)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| ModelError::InvalidTable {
        file: "workbook sheet".to_string(),
        message: e.to_string(),
    })
}
