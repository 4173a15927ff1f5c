//! Most-recent-first history table of one source.

use eframe::egui;
use egui_table::{HeaderRow, Table, TableDelegate};

use crate::data::sample::Sample;
use crate::source::Source;

pub const COLUMNS: [&str; 6] = ["#", "Timestamp (UTC)", "X (nT)", "Y (nT)", "Z (nT)", "T (°C)"];
const WIDTHS: [f32; 6] = [56.0, 220.0, 110.0, 110.0, 110.0, 90.0];

/// Text of one cell. `row` is zero-based, most recent first.
pub fn cell_text(row: usize, sample: &Sample, col: usize) -> String {
    match col {
        0 => (row + 1).to_string(),
        1 => sample.ts.clone(),
        2 => format!("{:.3}", sample.x),
        3 => format!("{:.3}", sample.y),
        4 => format!("{:.3}", sample.z),
        5 => sample
            .temperature
            .map(|t| format!("{t:.3}"))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

struct HistoryDelegate<'a> {
    rows: &'a [&'a Sample],
}

impl TableDelegate for HistoryDelegate<'_> {
    fn header_cell_ui(&mut self, ui: &mut egui::Ui, cell: &egui_table::HeaderCellInfo) {
        ui.add_space(4.0);
        ui.strong(COLUMNS.get(cell.col_range.start).copied().unwrap_or(""));
    }

    fn cell_ui(&mut self, ui: &mut egui::Ui, cell: &egui_table::CellInfo) {
        let row = cell.row_nr as usize;
        if let Some(sample) = self.rows.get(row) {
            ui.add_space(4.0);
            ui.monospace(cell_text(row, sample, cell.col_nr));
        }
    }
}

/// Draw the table. Returns `true` when Export was clicked.
pub(super) fn show(ui: &mut egui::Ui, source: &Source) -> bool {
    let rows = source.store().history_window();
    let mut export = false;
    ui.horizontal(|ui| {
        ui.strong("History");
        ui.weak(format!(
            "{} shown, {} retained",
            rows.len(),
            source.store().len()
        ));
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            export = ui
                .button(format!("{} Export", egui_phosphor::regular::EXPORT))
                .on_hover_text("Save every retained sample as JSON lines")
                .clicked();
        });
    });

    let mut delegate = HistoryDelegate { rows: &rows };
    let avail = ui.available_size();
    let (rect, _) = ui.allocate_exact_size(avail, egui::Sense::hover());
    let mut table_ui = ui.new_child(
        egui::UiBuilder::new()
            .max_rect(rect)
            .layout(egui::Layout::left_to_right(egui::Align::Min)),
    );
    Table::new()
        .id_salt(("history", source.id().as_str()))
        .num_rows(rows.len() as u64)
        .columns(WIDTHS.iter().map(|w| egui_table::Column::new(*w)).collect::<Vec<_>>())
        .headers(vec![HeaderRow::new(24.0)])
        .show(&mut table_ui, &mut delegate);
    export
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::parse;

    #[test]
    fn cells_use_three_decimals() {
        let s = parse(r#"{"ts":"2024-01-01T00:00:00Z","x":1.23456,"y":-2,"z":0.0005,"rt":21.5}"#)
            .unwrap();
        let cells: Vec<String> = (0..COLUMNS.len()).map(|c| cell_text(4, &s, c)).collect();
        assert_eq!(
            cells,
            ["5", "2024-01-01T00:00:00Z", "1.235", "-2.000", "0.001", "21.500"]
        );
    }

    #[test]
    fn missing_temperature_is_blank() {
        let s = parse(r#"{"ts":"2024-01-01T00:00:00Z","x":1,"y":2,"z":3}"#).unwrap();
        assert_eq!(cell_text(0, &s, 5), "");
    }
}
