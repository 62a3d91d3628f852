//! Pure view models and text rendering for the dashboard.

use chrono::{DateTime, Local, Utc};
use shared::domain::{Metrics, Vehicle, VehicleId, VehicleStatus};

use crate::{
    refresh::{RefreshPhase, RefreshSnapshot},
    row_actions::RowSnapshot,
};

const UNASSIGNED_PLACEHOLDER: &str = "Unassigned";
const NO_DRIVER: &str = "—";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCard {
    pub label: &'static str,
    pub value: String,
    pub sub: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusButton {
    pub status: VehicleStatus,
    pub label: &'static str,
    pub primary: bool,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowControls {
    pub save_enabled: bool,
    pub clear_enabled: bool,
    pub status_buttons: Vec<StatusButton>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleRow {
    pub id: VehicleId,
    pub status_label: &'static str,
    pub location: String,
    pub driver_input: String,
    pub driver_placeholder: String,
    pub current_driver: String,
    pub earnings: String,
    pub rides: u32,
    pub controls: RowControls,
}

pub fn status_label(status: VehicleStatus) -> &'static str {
    match status {
        VehicleStatus::Available => "Available",
        VehicleStatus::InRide => "In Ride",
        VehicleStatus::Maintenance => "Maintenance",
    }
}

/// Utilization is shown exactly as the backend computed it.
pub fn metric_cards(metrics: &Metrics) -> Vec<MetricCard> {
    vec![
        MetricCard {
            label: "Total Vehicles",
            value: metrics.total.to_string(),
            sub: None,
        },
        MetricCard {
            label: "Utilization",
            value: format!("{}%", metrics.utilization_pct),
            sub: Some("In ride / total"),
        },
        MetricCard {
            label: "Rides Today",
            value: metrics.total_rides_today.to_string(),
            sub: None,
        },
        MetricCard {
            label: "Earnings Today",
            value: format_money(metrics.total_earnings_today),
            sub: None,
        },
    ]
}

pub fn format_money(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Busy rows get every control disabled.
pub fn row_controls(status: VehicleStatus, busy: bool) -> RowControls {
    RowControls {
        save_enabled: !busy,
        clear_enabled: !busy,
        status_buttons: VehicleStatus::ALL
            .into_iter()
            .map(|option| StatusButton {
                status: option,
                label: status_label(option),
                primary: option == status,
                enabled: !busy && option != status,
            })
            .collect(),
    }
}

/// Table rows, most recently updated first.
pub fn vehicle_rows(vehicles: &[Vehicle], rows: &RowSnapshot) -> Vec<VehicleRow> {
    let mut sorted: Vec<&Vehicle> = vehicles.iter().collect();
    sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    sorted
        .into_iter()
        .map(|vehicle| VehicleRow {
            id: vehicle.id.clone(),
            status_label: status_label(vehicle.status),
            location: vehicle.location.clone(),
            driver_input: rows.draft(&vehicle.id).to_string(),
            driver_placeholder: vehicle
                .driver
                .clone()
                .unwrap_or_else(|| UNASSIGNED_PLACEHOLDER.to_string()),
            current_driver: vehicle
                .driver
                .clone()
                .unwrap_or_else(|| NO_DRIVER.to_string()),
            earnings: format_money(vehicle.earnings_today),
            rides: vehicle.rides_today,
            controls: row_controls(vehicle.status, rows.is_busy(&vehicle.id)),
        })
        .collect()
}

pub fn updated_label(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub fn refresh_button_label(phase: RefreshPhase) -> &'static str {
    match phase {
        RefreshPhase::Idle => "Refresh",
        RefreshPhase::Refreshing => "Refreshing…",
    }
}

pub fn render_metric_cards(metrics: &Metrics) -> String {
    metric_cards(metrics)
        .into_iter()
        .map(|card| match card.sub {
            Some(sub) => format!("{}: {} ({sub})", card.label, card.value),
            None => format!("{}: {}", card.label, card.value),
        })
        .collect::<Vec<_>>()
        .join("  |  ")
}

/// Whole dashboard as text. Disabled controls render in parentheses,
/// enabled ones in brackets, and the current status is starred.
pub fn render_dashboard(
    metrics: Option<&Metrics>,
    refresh: &RefreshSnapshot,
    rows: &RowSnapshot,
) -> String {
    let mut out = String::new();

    if let Some(metrics) = metrics {
        out.push_str(&render_metric_cards(metrics));
        out.push('\n');
    }

    if let Some(error) = &refresh.error {
        out.push_str(&format!("! Couldn't load vehicles: {error}\n"));
    }

    out.push_str(&format!(
        "Last updated: {}   {}\n",
        updated_label(refresh.last_updated),
        match refresh.phase {
            RefreshPhase::Idle => format!("[{}]", refresh_button_label(refresh.phase)),
            RefreshPhase::Refreshing => format!("({})", refresh_button_label(refresh.phase)),
        }
    ));

    let table = vehicle_rows(&refresh.vehicles, rows);
    if table.is_empty() {
        out.push_str("No vehicles found.\n");
        return out;
    }

    let header = [
        "Vehicle", "Status", "Location", "Driver", "Earnings", "Rides", "Actions",
    ];
    let cells: Vec<[String; 7]> = table.iter().map(row_cells).collect();
    let mut widths = header.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    out.push_str(&render_line(&header.map(str::to_string), &widths));
    for row in &cells {
        out.push_str(&render_line(row, &widths));
    }
    out
}

fn row_cells(row: &VehicleRow) -> [String; 7] {
    let driver = if row.driver_input.is_empty() {
        format!("{} [Save] [Clear]", row.current_driver)
    } else {
        format!("{} -> \"{}\" [Save] [Clear]", row.current_driver, row.driver_input)
    };
    let driver = if row.controls.save_enabled {
        driver
    } else {
        driver.replace("[Save]", "(Save)").replace("[Clear]", "(Clear)")
    };

    let actions = row
        .controls
        .status_buttons
        .iter()
        .map(|button| {
            let label = if button.primary {
                format!("{}*", button.label)
            } else {
                button.label.to_string()
            };
            if button.enabled {
                format!("[{label}]")
            } else {
                format!("({label})")
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    [
        row.id.to_string(),
        row.status_label.to_string(),
        row.location.clone(),
        driver,
        row.earnings.clone(),
        row.rides.to_string(),
        actions,
    ]
}

fn render_line(cells: &[String; 7], widths: &[usize; 7]) -> String {
    let mut line = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line.push('\n');
    line
}

#[cfg(test)]
#[path = "tests/presentation_tests.rs"]
mod tests;
