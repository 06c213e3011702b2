use anyhow::{Context, Result};
use chrono::Local;
use fidex_config::OutputConfig;
use fidex_core::model::{NormalizedRow, MANDATORY_COLUMNS};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

use crate::pipeline::TrackerTables;

/// Sheet receiving every equipment row. Always present in the workbook,
/// even when the pass produced nothing.
pub const EQUIPMENT_SHEET: &str = "Instrumentos";

/// Header layout for one sheet: the mandatory columns lead in fixed order,
/// followed by the union of all remaining keys across rows, sorted.
fn sheet_columns(rows: &[NormalizedRow]) -> Vec<String> {
    let mut extras = BTreeSet::new();
    for row in rows {
        for key in row.keys() {
            if !MANDATORY_COLUMNS.contains(&key.as_str()) {
                extras.insert(key.clone());
            }
        }
    }

    let mut columns: Vec<String> = MANDATORY_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(extras);
    columns
}

fn write_sheet(worksheet: &mut Worksheet, rows: &[NormalizedRow]) -> Result<(), XlsxError> {
    let columns = sheet_columns(rows);
    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, name.as_str())?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = row_idx as u32 + 1;
        for (col_idx, name) in columns.iter().enumerate() {
            let col_num = col_idx as u16;
            match row.get(name) {
                // absent keys stay blank cells
                None | Some(Value::Null) => {}
                Some(Value::Number(number)) => {
                    worksheet.write_number(row_num, col_num, number.as_f64().unwrap_or(0.0))?;
                }
                Some(Value::Bool(flag)) => {
                    worksheet.write_boolean(row_num, col_num, *flag)?;
                }
                Some(Value::String(text)) => {
                    worksheet.write_string(row_num, col_num, text.as_str())?;
                }
                Some(other) => {
                    worksheet.write_string(row_num, col_num, other.to_string())?;
                }
            }
        }
    }

    Ok(())
}

/// Writes one sheet per non-empty general-register table plus the equipment
/// sheet into `<dir>/<timestamp>_<suffix>.xlsx` and returns the path.
pub fn save_workbook(
    cfg: &OutputConfig,
    general_register: &TrackerTables,
    equipment: &[NormalizedRow],
) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = PathBuf::from(&cfg.dir).join(format!("{stamp}_{}.xlsx", cfg.filename_suffix));

    let mut workbook = Workbook::new();

    for table in general_register.iter() {
        if table.rows.is_empty() {
            debug!("tracker '{}' collected no rows; sheet omitted", table.name);
            continue;
        }
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(table.name.as_str())?;
        write_sheet(worksheet, &table.rows)?;
    }

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EQUIPMENT_SHEET)?;
    if !equipment.is_empty() {
        write_sheet(worksheet, equipment)?;
    }

    workbook
        .save(&path)
        .with_context(|| format!("failed to write workbook {}", path.display()))?;

    Ok(path)
}
