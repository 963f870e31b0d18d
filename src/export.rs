use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::engine::TrainingSet;
use crate::frame::RowKey;
use crate::schema::FillDefault;

const KEY_HEADERS: [&str; 5] = ["Match ID", "Team", "Opponent", "Date", "Venue"];

pub struct ExportReport {
    pub rows: usize,
    pub features: usize,
}

/// Writes the training table as a workbook with `Features`, `Targets` and
/// `Schema` sheets.
pub fn write_training_xlsx(path: &Path, set: &TrainingSet) -> Result<ExportReport> {
    let mut workbook = Workbook::new();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Features")?;
        let mut header = KEY_HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>();
        header.extend(set.schema.names());
        write_header(sheet, &header)?;
        for (idx, row) in set.rows.iter().enumerate() {
            let r = idx as u32 + 1;
            write_key(sheet, r, &row.key)?;
            for (c, value) in row.values.iter().enumerate() {
                let col = (KEY_HEADERS.len() + c) as u16;
                sheet
                    .write_number(r, col, *value)
                    .with_context(|| format!("write feature cell ({r},{col})"))?;
            }
        }
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Targets")?;
        let mut header = KEY_HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>();
        header.extend(
            [
                "Result",
                "Goals For",
                "Goals Against",
                "Total Goals",
                "Cards",
                "Over 2.5",
                "BTTS",
            ]
            .iter()
            .map(|h| h.to_string()),
        );
        write_header(sheet, &header)?;
        let base = KEY_HEADERS.len() as u16;
        for (idx, (row, target)) in set.rows.iter().zip(&set.targets).enumerate() {
            let r = idx as u32 + 1;
            write_key(sheet, r, &row.key)?;
            sheet.write_string(r, base, target.result.code().to_string())?;
            let numbers = [
                target.goals_for,
                target.goals_against,
                target.total_goals,
                target.cards,
                target.over_2_5.map(flag),
                target.btts.map(flag),
            ];
            for (offset, value) in numbers.iter().enumerate() {
                if let Some(v) = value {
                    sheet
                        .write_number(r, base + 1 + offset as u16, *v)
                        .with_context(|| format!("write target cell ({r},{offset})"))?;
                }
            }
        }
    }

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Schema")?;
        write_header(
            sheet,
            &["Feature".to_string(), "Default".to_string()],
        )?;
        for (idx, entry) in set.schema.features.iter().enumerate() {
            let r = idx as u32 + 1;
            sheet.write_string(r, 0, &entry.name)?;
            match entry.default {
                FillDefault::Value(v) => sheet.write_number(r, 1, v)?,
                FillDefault::Required => sheet.write_string(r, 1, "required")?,
            };
        }
        sheet.write_string(set.schema.len() as u32 + 2, 0, "Fingerprint")?;
        sheet.write_string(set.schema.len() as u32 + 2, 1, &set.schema.fingerprint)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        rows: set.rows.len(),
        features: set.schema.len(),
    })
}

fn write_header(worksheet: &mut Worksheet, header: &[String]) -> Result<()> {
    for (col_idx, value) in header.iter().enumerate() {
        worksheet
            .write_string(0, col_idx as u16, value)
            .with_context(|| format!("write header cell {col_idx}"))?;
    }
    Ok(())
}

fn write_key(worksheet: &mut Worksheet, row: u32, key: &RowKey) -> Result<()> {
    let cells = [
        key.match_id.clone(),
        key.entity.to_string(),
        key.opponent.to_string(),
        key.date.to_string(),
        key.venue.label().to_string(),
    ];
    for (col_idx, value) in cells.iter().enumerate() {
        worksheet
            .write_string(row, col_idx as u16, value)
            .with_context(|| format!("write key cell ({row},{col_idx})"))?;
    }
    Ok(())
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}
