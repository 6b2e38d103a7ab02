//! Wire types for the game server's JSON API (spec §3, §6).
//!
//! Every type here derives `Deserialize` (and `Serialize` for request bodies) and accepts
//! unknown fields rather than rejecting them — the Protocol error-handling policy (spec §7)
//! treats an unexpected shape as "missing fields become zero/empty", not a hard failure.

use serde::{Deserialize, Serialize};

pub type LocationId = String;
pub type ShipId = String;

/// A node in the location tree rooted at the Sun (spec §3 "Location").
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub parent_id: Option<LocationId>,
    #[serde(default)]
    pub is_group: bool,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub sort_order: Option<i64>,
    #[serde(default)]
    pub wiki_hint: Option<String>,
}

/// A nested tree view used by the transfer-planner destination picker (`/api/locations/tree`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LocationTreeNode {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub children: Vec<LocationTreeNode>,
}

/// One leg of a ship's in-progress or planned transfer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferLeg {
    pub from_id: LocationId,
    pub to_id: LocationId,
    pub departure_time: f64,
    pub arrival_time: f64,
    pub tof_s: f64,
    #[serde(default)]
    pub is_interplanetary: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DockStatus {
    Docked,
    Transit,
}

/// A player ship (spec §3 "Ship"). The client never mutates these; they are replaced wholesale
/// on every `/api/state` poll.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Ship {
    pub id: ShipId,
    pub name: String,
    pub color_hex: String,
    #[serde(default = "default_ship_size")]
    pub display_size: f64,
    pub status: DockStatus,
    #[serde(default)]
    pub location_id: Option<LocationId>,
    #[serde(default)]
    pub from_location_id: Option<LocationId>,
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
    #[serde(default)]
    pub departed_at: Option<f64>,
    #[serde(default)]
    pub arrives_at: Option<f64>,
    #[serde(default)]
    pub transfer_legs: Vec<TransferLeg>,
    pub dry_mass_kg: f64,
    pub fuel_mass_kg: f64,
    pub isp_seconds: f64,
    pub thrust_newtons: f64,
    pub delta_v_remaining_km_s: f64,
    #[serde(default)]
    pub power_balance_w: Option<f64>,
    #[serde(default)]
    pub waste_heat_surplus_w: Option<f64>,
    #[serde(default)]
    pub parts: Vec<String>,
    #[serde(default)]
    pub cargo: Vec<CargoItem>,
    #[serde(default)]
    pub dock_slot: Option<u32>,
}

fn default_ship_size() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CargoItem {
    pub container_index: u32,
    pub name: String,
    #[serde(default)]
    pub quantity: f64,
}

/// `GET /api/state` response: `{server_time, time_scale, ships[]}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StateResponse {
    pub server_time: f64,
    pub time_scale: f64,
    #[serde(default)]
    pub ships: Vec<Ship>,
}

/// `GET /api/org` top-bar financial summary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct OrgSummary {
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub income: f64,
    #[serde(default)]
    pub research: f64,
    #[serde(default)]
    pub expenses: f64,
}

/// `GET /api/inventory/location/:id` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LocationInventory {
    #[serde(default)]
    pub resources: Vec<CargoItem>,
    #[serde(default)]
    pub parts: Vec<String>,
}

/// `GET /api/transfer_quote_advanced` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferQuote {
    pub path: Vec<LocationId>,
    pub lambert_dv_km_s: f64,
    pub phase_adjusted_dv_km_s: f64,
    pub tof_s: f64,
    #[serde(default)]
    pub phase_angle_rad: Option<f64>,
    #[serde(default)]
    pub synodic_period_s: Option<f64>,
    #[serde(default)]
    pub next_window_s: Option<f64>,
}

/// A single cell of the porkchop Δv grid (spec §4.8).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PorkchopCell {
    pub departure_time: f64,
    pub tof_s: f64,
    pub dv_total_km_s: f64,
    #[serde(default = "default_true")]
    pub feasible: bool,
}

fn default_true() -> bool {
    true
}

/// `GET /api/transfer/porkchop` response: a dense `grid_size * grid_size` grid plus the axes
/// used to index it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct PorkchopGrid {
    pub departure_times: Vec<f64>,
    pub tofs_s: Vec<f64>,
    pub cells: Vec<PorkchopCell>,
}

impl PorkchopGrid {
    pub fn grid_size(&self) -> (usize, usize) {
        (self.departure_times.len(), self.tofs_s.len())
    }

    pub fn cell_at(&self, departure_index: usize, tof_index: usize) -> Option<&PorkchopCell> {
        let (_, tof_count) = self.grid_size();
        self.cells.get(departure_index * tof_count + tof_index)
    }

    /// The minimum and `min(max, 3*min)`-clipped maximum feasible Δv in the grid, used to
    /// build the color scale in spec §4.8.
    pub fn dv_color_range(&self) -> Option<(f64, f64)> {
        let min = self
            .cells
            .iter()
            .filter(|c| c.feasible)
            .map(|c| c.dv_total_km_s)
            .fold(f64::INFINITY, f64::min);
        if !min.is_finite() {
            return None;
        }
        let max = self
            .cells
            .iter()
            .filter(|c| c.feasible)
            .map(|c| c.dv_total_km_s)
            .fold(f64::NEG_INFINITY, f64::max);
        let high_clip = (min * 3.0).min(max);
        Some((min, high_clip))
    }
}

/// Body posted to `POST /api/ships/:id/transfer`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferRequest {
    pub to_location_id: LocationId,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryAction {
    Jettison,
    Deploy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct InventoryActionRequest {
    pub container_index: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DeconstructRequest {
    pub keep_ship_record: bool,
}

/// The server's standard error body for user-triggered actions (spec §7): `{"detail": "..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn porkchop_color_range_clips_to_three_times_min() {
        let grid = PorkchopGrid {
            departure_times: vec![0.0, 1.0],
            tofs_s: vec![0.0, 1.0],
            cells: vec![
                PorkchopCell { departure_time: 0.0, tof_s: 0.0, dv_total_km_s: 2.0, feasible: true },
                PorkchopCell { departure_time: 0.0, tof_s: 1.0, dv_total_km_s: 100.0, feasible: true },
                PorkchopCell { departure_time: 1.0, tof_s: 0.0, dv_total_km_s: 3.0, feasible: true },
                PorkchopCell { departure_time: 1.0, tof_s: 1.0, dv_total_km_s: 4.0, feasible: true },
            ],
        };
        let (min, high_clip) = grid.dv_color_range().unwrap();
        assert_eq!(min, 2.0);
        assert_eq!(high_clip, 6.0);
    }

    #[test]
    fn porkchop_color_range_ignores_infeasible_cells() {
        let grid = PorkchopGrid {
            departure_times: vec![0.0],
            tofs_s: vec![0.0],
            cells: vec![PorkchopCell {
                departure_time: 0.0,
                tof_s: 0.0,
                dv_total_km_s: 2.0,
                feasible: false,
            }],
        };
        assert!(grid.dv_color_range().is_none());
    }

    #[test]
    fn cell_at_indexes_row_major_by_departure_then_tof() {
        let grid = PorkchopGrid {
            departure_times: vec![0.0, 1.0],
            tofs_s: vec![0.0, 1.0, 2.0],
            cells: (0..6)
                .map(|i| PorkchopCell {
                    departure_time: (i / 3) as f64,
                    tof_s: (i % 3) as f64,
                    dv_total_km_s: i as f64,
                    feasible: true,
                })
                .collect(),
        };
        assert_eq!(grid.cell_at(1, 2).unwrap().dv_total_km_s, 5.0);
    }
}
