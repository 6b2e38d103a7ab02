//! The `eframe` host for the orbital-map client: wires the pure core crates (camera, scene,
//! interaction, sync, planner) to an egui canvas and a background tokio runtime driving the
//! periodic polls described in spec §4.7.

mod app;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use eframe::egui;
use tokio::sync::Mutex;

use app::{
    AppError, AppEvent, ContextMenuState, InfoLine, InfoPanel, MapClient, PanelId,
    ReferenceCardHost, SharedMapClient, WindowManager,
};
use orbitmap_api::model::{LocationTreeNode, TransferLeg};
use orbitmap_api::ApiClient;
use orbitmap_config::{ClientConfig, PanelLayout, PanelLayoutStore};
use orbitmap_core::vector::Vector2;
use orbitmap_curves::{
    BezierCurve, CompositeCurve, CompositeLeg, Curve, HohmannArcCurve, COMPOSITE_BEZIER_SAMPLES,
    COMPOSITE_HOHMANN_SAMPLES,
};
use orbitmap_interaction::{
    body_context_menu, chip_context_menu, hit_test, orbit_or_location_context_menu,
    position_menu, ship_context_menu, BodyGroupCandidate, ChipCandidate, ContextMenuOption,
    DismissReason, HitTarget, HitTestInput, LocationMarkerCandidate, OrbitRingCandidate,
    ShipCandidate, MENU_VIEWPORT_MARGIN_PX,
};
use orbitmap_planner::{
    cell_at_tof, dv_to_color, feasibility_for_quote, heliocentric_zones, PlannerEvent,
    PlannerState,
};
use orbitmap_projection::{LocationArena, RawLocation};
use orbitmap_propulsion::FeasibilityReport;
use orbitmap_scene::{classify, LocationKind, SceneNode};

fn real_now_s() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

fn config_paths() -> (std::path::PathBuf, std::path::PathBuf) {
    let dirs = directories::ProjectDirs::from("", "", "orbitmap");
    match dirs {
        Some(dirs) => {
            let base = dirs.config_dir();
            (base.join("client.toml"), base.join("panel_layout.json"))
        }
        None => (
            std::path::PathBuf::from("orbitmap-client.toml"),
            std::path::PathBuf::from("orbitmap-panel-layout.json"),
        ),
    }
}

fn build_api_client(config: &ClientConfig) -> Result<ApiClient, AppError> {
    Ok(ApiClient::new(&config.api_base_url)?)
}

/// Floating-panel chrome backed by a `PanelLayoutStore` persisted to disk (spec §6 "a single
/// JSON file under the OS config directory").
struct EguiWindowManager {
    store: PanelLayoutStore,
    path: std::path::PathBuf,
    front_panel: Option<PanelId>,
}

impl EguiWindowManager {
    fn new(path: std::path::PathBuf) -> Self {
        let store = orbitmap_config::load_panel_layout(&path);
        EguiWindowManager { store, path, front_panel: None }
    }

    fn panel_key(panel: PanelId) -> &'static str {
        match panel {
            PanelId::Info => "infoPanel",
            PanelId::Overview => "overviewPanel",
            PanelId::ZoneJumpBar => "zoneJumpBar",
            PanelId::ShipInfoTabs => "shipInfoTabsHost",
            PanelId::RealWorldRef => "realWorldRef",
            PanelId::Org => "mapOrg",
        }
    }

    fn default_layout() -> PanelLayout {
        PanelLayout { left: 40.0, top: 40.0, width: 320.0, height: 240.0, open: false, minimized: false }
    }

    fn mutate(&mut self, panel: PanelId, f: impl FnOnce(&mut PanelLayout)) {
        let key = Self::panel_key(panel);
        let mut layout = self.store.get(key).unwrap_or_else(Self::default_layout);
        f(&mut layout);
        self.store.set(key, layout);
        if let Err(err) = orbitmap_config::save_panel_layout(&self.path, &self.store) {
            tracing::warn!(%err, "failed to persist panel layout");
        }
    }

    /// Read-only layout lookup for the render loop; unlike `mutate`, never re-persists.
    fn layout_of(&self, panel: PanelId) -> PanelLayout {
        self.store.get(Self::panel_key(panel)).unwrap_or_else(Self::default_layout)
    }

    fn is_front(&self, panel: PanelId) -> bool {
        self.front_panel == Some(panel)
    }
}

impl WindowManager for EguiWindowManager {
    fn open(&mut self, panel: PanelId) {
        self.mutate(panel, |l| {
            l.open = true;
            l.minimized = false;
        });
        self.front_panel = Some(panel);
    }

    fn close(&mut self, panel: PanelId) {
        self.mutate(panel, |l| l.open = false);
        if self.front_panel == Some(panel) {
            self.front_panel = None;
        }
    }

    fn minimize(&mut self, panel: PanelId) {
        self.mutate(panel, |l| l.minimized = true);
    }

    fn bring_to_front(&mut self, panel: PanelId) {
        self.front_panel = Some(panel);
    }
}

#[derive(Default)]
struct EguiInfoPanel {
    title: String,
    subtitle: String,
    items: Vec<InfoLine>,
}

impl InfoPanel for EguiInfoPanel {
    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    fn set_subtitle(&mut self, subtitle: &str) {
        self.subtitle = subtitle.to_string();
    }

    fn set_list(&mut self, items: Vec<InfoLine>) {
        self.items = items;
    }

    fn clear(&mut self) {
        self.title.clear();
        self.subtitle.clear();
        self.items.clear();
    }
}

#[derive(Default)]
struct EguiReferenceCardHost {
    shown_location_id: Option<String>,
}

impl ReferenceCardHost for EguiReferenceCardHost {
    fn show_reference(&mut self, location_id: &str) {
        self.shown_location_id = Some(location_id.to_string());
    }
}

/// Sum of direct children's distance from an orbit-ring location's own projected position,
/// giving each ring a world-space radius to draw and hit-test against (spec §4.4).
fn compute_orbit_radii(arena: &LocationArena, projected: &HashMap<usize, Vector2>) -> HashMap<usize, f64> {
    let mut sums: HashMap<usize, (f64, usize)> = HashMap::new();
    for ix in 0..arena.len() {
        let Some(parent_ix) = arena.node(ix).parent_ix else { continue };
        if classify(arena, parent_ix) != LocationKind::OrbitRing {
            continue;
        }
        let center = projected.get(&parent_ix).copied().unwrap_or(Vector2::ZERO);
        let pos = projected.get(&ix).copied().unwrap_or(Vector2::ZERO);
        let entry = sums.entry(parent_ix).or_insert((0.0, 0));
        entry.0 += pos.sub(center).norm();
        entry.1 += 1;
    }
    sums.into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(ix, (sum, n))| (ix, sum / n as f64))
        .collect()
}

/// Build a ship's transit curve from its server-reported legs (spec §4.3): each leg becomes a
/// Bezier arc for an intra-body hop or a Hohmann half-ellipse for an interplanetary one, stitched
/// into one time-parameterized `CompositeCurve`. Interplanetary legs share the Sun's world-space
/// origin as their focus, matching `orbitmap_projection`'s convention of projecting the Sun to
/// `Vector2::ZERO`. Returns `None` if either endpoint of any leg isn't known yet.
fn build_ship_curve(legs: &[TransferLeg], known_positions: &HashMap<String, Vector2>) -> Option<Box<dyn Curve + Send>> {
    if legs.is_empty() {
        return None;
    }
    let mut composite_legs = Vec::with_capacity(legs.len());
    for leg in legs {
        let from = *known_positions.get(&leg.from_id)?;
        let to = *known_positions.get(&leg.to_id)?;
        let (curve, sample_count): (Box<dyn Curve + Send>, usize) = if leg.is_interplanetary {
            (Box::new(HohmannArcCurve::new(from, to, Vector2::ZERO)), COMPOSITE_HOHMANN_SAMPLES)
        } else {
            let mid = from.lerp(to, 0.5);
            (Box::new(BezierCurve::new(from, mid, mid, to)), COMPOSITE_BEZIER_SAMPLES)
        };
        composite_legs.push(CompositeLeg { curve, tof_s: leg.tof_s.max(1.0), sample_count });
    }
    Some(Box::new(CompositeCurve::new(composite_legs)))
}

/// Spawn the three periodic pollers described in spec §4.7, each independently wrapped so one
/// tick's failure is logged and retried rather than stopping the loop (spec §7 propagation
/// policy).
fn spawn_sync_loops(client: SharedMapClient, api: ApiClient) {
    let locations_client = client.clone();
    let locations_api = api.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(
            orbitmap_sync::LOCATIONS_POLL_INTERVAL_S,
        ));
        loop {
            ticker.tick().await;
            match locations_api.get_locations(None).await {
                Ok(locations) => {
                    let raw: Vec<RawLocation> = locations
                        .iter()
                        .map(|l| RawLocation {
                            id: l.id.clone(),
                            parent_id: l.parent_id.clone(),
                            is_group: l.is_group,
                            x_km: l.x,
                            y_km: l.y,
                        })
                        .collect();
                    let arena = LocationArena::build(&raw);
                    let projected = orbitmap_projection::project_all(&arena);
                    let radii = compute_orbit_radii(&arena, &projected);
                    let mut guard = locations_client.lock().await;
                    let fresh: Vec<SceneNode> = (0..arena.len())
                        .map(|ix| SceneNode {
                            id: arena.node(ix).id.clone(),
                            kind: classify(&arena, ix),
                            orbit_radius_world: radii.get(&ix).copied(),
                        })
                        .collect();
                    guard.scene.reconcile_locations(fresh);
                    let previous = guard.known_location_positions.clone();
                    let now_s = real_now_s();
                    let positions: Vec<(String, Vector2)> = projected
                        .into_iter()
                        .map(|(ix, pos)| (arena.node(ix).id.clone(), pos))
                        .collect();
                    guard.interpolations.install(
                        positions.iter().cloned(),
                        |id| previous.get(id).copied(),
                        now_s,
                    );
                    guard.known_location_positions = positions.into_iter().collect();
                }
                Err(err) => tracing::warn!(%err, "locations poll failed, retaining last-good state"),
            }
        }
    });

    let state_client = client.clone();
    let state_api = api.clone();
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs_f64(orbitmap_sync::STATE_POLL_INTERVAL_S));
        loop {
            ticker.tick().await;
            match state_api.get_state().await {
                Ok(state) => {
                    let mut guard = state_client.lock().await;
                    guard.clock.sync(state.server_time, state.time_scale, real_now_s());
                    guard.scene.reconcile_ships(state.ships.iter().map(|s| s.id.clone()));

                    let mut docked_ids_by_location: HashMap<String, Vec<String>> = HashMap::new();
                    let mut explicit_by_location: HashMap<String, HashMap<String, usize>> = HashMap::new();
                    for ship in &state.ships {
                        if ship.status != orbitmap_api::model::DockStatus::Docked {
                            continue;
                        }
                        let Some(loc_id) = &ship.location_id else { continue };
                        docked_ids_by_location.entry(loc_id.clone()).or_default().push(ship.id.clone());
                        if let Some(slot) = ship.dock_slot {
                            explicit_by_location
                                .entry(loc_id.clone())
                                .or_default()
                                .insert(ship.id.clone(), slot as usize);
                        }
                    }
                    for (loc_id, mut ids) in docked_ids_by_location {
                        ids.sort();
                        let explicit = explicit_by_location.remove(&loc_id).unwrap_or_default();
                        let slots = orbitmap_scene::assign_dock_slots(&explicit, &ids);
                        for (ship_id, slot) in slots {
                            guard.scene.set_ship_dock_slot(&ship_id, Some(slot));
                        }
                    }

                    let known_positions = guard.known_location_positions.clone();
                    for ship in &state.ships {
                        let curve = build_ship_curve(&ship.transfer_legs, &known_positions);
                        guard.scene.set_ship_curve(&ship.id, curve);
                    }

                    let anchors = guard.anchors.clone();
                    let buckets: Vec<i64> = state
                        .ships
                        .iter()
                        .flat_map(|ship| {
                            orbitmap_anchors::buckets_for_ship(
                                ship.departed_at,
                                ship.arrives_at,
                                ship.transfer_legs.iter().map(|l| (l.departure_time, l.arrival_time)),
                            )
                        })
                        .collect();
                    guard.ships = state.ships.into_iter().map(|s| (s.id.clone(), s)).collect();
                    drop(guard);
                    if !buckets.is_empty() {
                        let _ = anchors.ensure_ship_buckets(&buckets, &state_api).await;
                    }
                }
                Err(err) => tracing::warn!(%err, "state poll failed, retaining last-good state"),
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs_f64(orbitmap_sync::ORG_POLL_INTERVAL_S));
        loop {
            ticker.tick().await;
            if let Err(err) = api.get_org().await {
                tracing::warn!(%err, "org poll failed, retaining last-good state");
            }
        }
    });
}

fn parse_color_hex(hex: &str) -> egui::Color32 {
    let hex = hex.trim_start_matches('#');
    if hex.len() == 6 {
        if let Ok(value) = u32::from_str_radix(hex, 16) {
            let r = ((value >> 16) & 0xFF) as u8;
            let g = ((value >> 8) & 0xFF) as u8;
            let b = (value & 0xFF) as u8;
            return egui::Color32::from_rgb(r, g, b);
        }
    }
    egui::Color32::LIGHT_BLUE
}

/// `true` if the currently selected ship is docked somewhere other than `target_location_id`,
/// the enabling condition for "Move here…" on an orbit ring or location marker (spec §4.6).
fn is_selected_ship_docked_elsewhere(client: &MapClient, target_location_id: &str) -> bool {
    let Some(HitTarget::Ship(ship_id)) = &client.selection.selected else { return false };
    let Some(ship) = client.ships.get(ship_id) else { return false };
    ship.status == orbitmap_api::model::DockStatus::Docked
        && ship.location_id.as_deref() != Some(target_location_id)
}

/// A deferred side effect from the planner modal, applied after its `egui::Window` closure
/// returns so it can freely borrow `client` without fighting the UI closure's own borrow.
enum PlannerModalAction {
    SelectDestination(String),
    RequestPorkchop,
    AdjustTof(usize, usize),
    Confirm,
    Cancel,
}

struct OrbitmapApp {
    client: SharedMapClient,
    api: ApiClient,
    info_panel: EguiInfoPanel,
    window_manager: EguiWindowManager,
    reference_host: EguiReferenceCardHost,
    ship_screen_positions: HashMap<String, Vector2>,
    last_screen_rect: egui::Rect,
    was_focused: bool,
}

impl OrbitmapApp {
    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Selected(HitTarget::LocationMarker(id)) | AppEvent::Selected(HitTarget::BodyGroup(id)) => {
                self.info_panel.set_title(&id);
                self.reference_host.show_reference(&id);
                self.window_manager.open(PanelId::Info);
            }
            AppEvent::Selected(HitTarget::Ship(id)) => {
                self.info_panel.set_title(&id);
                self.window_manager.open(PanelId::ShipInfoTabs);
            }
            AppEvent::Selected(_) => {}
            AppEvent::Deselected => self.info_panel.clear(),
            AppEvent::SessionExpired => tracing::warn!("session expired"),
            AppEvent::RendererLost => self.info_panel.set_subtitle("Renderer context lost"),
            AppEvent::RendererRestored => self.info_panel.set_subtitle(""),
        }
    }

    fn spawn_locations_tree_request(&self) {
        let client = self.client.clone();
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.get_locations_tree().await {
                Ok(tree) => client.lock().await.open_planner(tree),
                Err(err) => tracing::warn!(%err, "failed to load destination tree"),
            }
        });
    }

    fn spawn_quote_request(&self, from_id: String, to_id: String, departure_time: f64) {
        let client = self.client.clone();
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.get_transfer_quote(&from_id, &to_id, departure_time, 0.0).await {
                Ok(quote) => client.lock().await.dispatch_planner_event(PlannerEvent::QuoteReturned(quote)),
                Err(err) => {
                    tracing::warn!(%err, "transfer quote fetch failed, cancelling planner");
                    client.lock().await.dispatch_planner_event(PlannerEvent::Cancel);
                }
            }
        });
    }

    fn spawn_porkchop_request(&self, from_id: String, to_id: String, departure_start: f64) {
        let client = self.client.clone();
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.get_porkchop(&from_id, &to_id, departure_start, 9).await {
                Ok(grid) => client.lock().await.dispatch_planner_event(PlannerEvent::PorkchopReturned(grid)),
                Err(err) => {
                    tracing::warn!(%err, "porkchop fetch failed, cancelling planner");
                    client.lock().await.dispatch_planner_event(PlannerEvent::Cancel);
                }
            }
        });
    }

    fn spawn_submit_transfer(&self, ship_id: String, to_location_id: String) {
        let client = self.client.clone();
        let api = self.api.clone();
        tokio::spawn(async move {
            match api.post_transfer(&ship_id, &to_location_id).await {
                Ok(()) => client.lock().await.dispatch_planner_event(PlannerEvent::SubmitSucceeded),
                Err(err) => {
                    client.lock().await.dispatch_planner_event(PlannerEvent::SubmitFailed(err.to_string()))
                }
            }
        });
    }

    fn apply_context_menu_choice(&mut self, client: &mut MapClient, target: &HitTarget, option_id: &str) {
        match (target, option_id) {
            (HitTarget::Ship(ship_id), "select") => {
                let event = client.select(Some(HitTarget::Ship(ship_id.clone())));
                if let Some(event) = event {
                    self.handle_event(event);
                }
            }
            (HitTarget::Ship(ship_id), "details") => {
                self.info_panel.set_title(ship_id);
                self.window_manager.open(PanelId::ShipInfoTabs);
                self.window_manager.bring_to_front(PanelId::ShipInfoTabs);
            }
            (HitTarget::Ship(_), "plan_transfer") => {
                client.planner = PlannerState::Idle;
                client.planner_modal_open = true;
                self.spawn_locations_tree_request();
            }
            (HitTarget::OrbitRing(location_id), "move_here")
            | (HitTarget::LocationMarker(location_id), "move_here") => {
                if let Some(HitTarget::Ship(ship_id)) = client.selection.selected.clone() {
                    let from_id = client.ships.get(&ship_id).and_then(|s| s.location_id.clone());
                    client.dispatch_planner_event(PlannerEvent::SelectDestination {
                        ship_id: ship_id.clone(),
                        to_location_id: location_id.clone(),
                    });
                    client.planner_modal_open = true;
                    if let Some(from_id) = from_id {
                        self.spawn_quote_request(from_id, location_id.clone(), real_now_s());
                    }
                }
            }
            (HitTarget::OrbitRing(location_id), "details")
            | (HitTarget::LocationMarker(location_id), "details")
            | (HitTarget::BodyGroup(location_id), "details") => {
                self.info_panel.set_title(location_id);
                self.reference_host.show_reference(location_id);
                self.window_manager.open(PanelId::Info);
                self.window_manager.bring_to_front(PanelId::Info);
            }
            (HitTarget::DockedChip(_), ship_id) => {
                let event = client.select(Some(HitTarget::Ship(ship_id.to_string())));
                if let Some(event) = event {
                    self.handle_event(event);
                }
            }
            _ => {}
        }
    }

    fn apply_planner_action(&mut self, client: &mut MapClient, action: PlannerModalAction) {
        match action {
            PlannerModalAction::SelectDestination(to_location_id) => {
                let Some(HitTarget::Ship(ship_id)) = client.selection.selected.clone() else {
                    tracing::warn!("destination chosen with no ship selected, ignoring");
                    return;
                };
                let from_id = client.ships.get(&ship_id).and_then(|s| s.location_id.clone());
                client.dispatch_planner_event(PlannerEvent::SelectDestination {
                    ship_id,
                    to_location_id: to_location_id.clone(),
                });
                if let Some(from_id) = from_id {
                    self.spawn_quote_request(from_id, to_location_id, real_now_s());
                }
            }
            PlannerModalAction::RequestPorkchop => {
                if let PlannerState::Quoted { ship_id, to_location_id, .. } = &client.planner {
                    let from_id = client.ships.get(ship_id).and_then(|s| s.location_id.clone());
                    let to_location_id = to_location_id.clone();
                    if let Some(from_id) = from_id {
                        self.spawn_porkchop_request(from_id, to_location_id, real_now_s());
                    }
                }
            }
            PlannerModalAction::AdjustTof(departure_index, tof_index) => {
                client.dispatch_planner_event(PlannerEvent::AdjustTof { departure_index, tof_index });
            }
            PlannerModalAction::Confirm => {
                if let PlannerState::Porkchop { ship_id, to_location_id, .. } = &client.planner {
                    let ship_id = ship_id.clone();
                    let to_location_id = to_location_id.clone();
                    client.dispatch_planner_event(PlannerEvent::Confirm);
                    self.spawn_submit_transfer(ship_id, to_location_id);
                }
            }
            PlannerModalAction::Cancel => client.close_planner(),
        }
    }

    fn draw_context_menu(&mut self, ctx: &egui::Context, client: &mut MapClient) {
        let Some(menu) = client.context_menu.clone() else { return };
        let mut dismiss: Option<DismissReason> = None;
        let mut chosen: Option<String> = None;

        let area_response = egui::Area::new(egui::Id::new("orbitmap_context_menu"))
            .order(egui::Order::Foreground)
            .fixed_pos(egui::pos2(menu.screen_pos.x as f32, menu.screen_pos.y as f32))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    for option in &menu.options {
                        if ui.add_enabled(option.enabled, egui::Button::new(option.label.as_str())).clicked() {
                            chosen = Some(option.id.clone());
                        }
                    }
                });
            });

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            dismiss = Some(DismissReason::Escape);
        } else if chosen.is_none()
            && ctx.input(|i| i.pointer.button_clicked(egui::PointerButton::Primary))
            && !area_response.response.contains_pointer()
        {
            dismiss = Some(DismissReason::OutsidePointerDown);
        }

        if let Some(option_id) = chosen {
            self.apply_context_menu_choice(client, &menu.target, &option_id);
            client.dismiss_context_menu(DismissReason::OutsidePointerDown);
        } else if let Some(reason) = dismiss {
            client.dismiss_context_menu(reason);
        }
    }

    fn draw_planner_modal(&mut self, ctx: &egui::Context, client: &mut MapClient) {
        if !client.planner_modal_open {
            return;
        }
        let mut close = false;
        let mut action: Option<PlannerModalAction> = None;

        egui::Window::new("Transfer Planner")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                match &client.planner {
                    PlannerState::Idle => {
                        ui.label("Choose a destination:");
                        let zones: Vec<LocationTreeNode> = heliocentric_zones(&client.planner_tree).to_vec();
                        for zone in &zones {
                            let expanded = client.planner_accordion.is_expanded(&zone.id);
                            if ui.selectable_label(expanded, zone.name.as_str()).clicked() {
                                client.planner_accordion.toggle(&zone.id);
                            }
                            if expanded {
                                ui.indent(&zone.id, |ui| {
                                    for child in &zone.children {
                                        if ui.button(child.name.as_str()).clicked() {
                                            action = Some(PlannerModalAction::SelectDestination(child.id.clone()));
                                        }
                                    }
                                });
                            }
                        }
                    }
                    PlannerState::Destination { .. } => {
                        ui.label("Requesting transfer quote…");
                    }
                    PlannerState::Quoted { quote, .. } => {
                        ui.label(format!(
                            "Δv {:.2} km/s, time of flight {:.1} days",
                            quote.phase_adjusted_dv_km_s,
                            quote.tof_s / 86_400.0,
                        ));
                        if ui.button("See departure window options").clicked() {
                            action = Some(PlannerModalAction::RequestPorkchop);
                        }
                    }
                    PlannerState::Porkchop {
                        ship_id,
                        grid,
                        departure_index,
                        tof_index,
                        last_error,
                        ..
                    } => {
                        let (dep_count, tof_count) = grid.grid_size();
                        if let Some((min, high_clip)) = grid.dv_color_range() {
                            let cell_px = 10.0_f32;
                            let (response, painter) = ui.allocate_painter(
                                egui::vec2(cell_px * dep_count as f32, cell_px * tof_count as f32),
                                egui::Sense::hover(),
                            );
                            for di in 0..dep_count {
                                for ti in 0..tof_count {
                                    if let Some(cell) = cell_at_tof(grid, di, ti) {
                                        let (r, g, b) = if cell.feasible {
                                            dv_to_color(cell.dv_total_km_s, min, high_clip)
                                        } else {
                                            (60, 60, 60)
                                        };
                                        let rect = egui::Rect::from_min_size(
                                            response.rect.min + egui::vec2(di as f32 * cell_px, ti as f32 * cell_px),
                                            egui::vec2(cell_px, cell_px),
                                        );
                                        painter.rect_filled(
                                            rect,
                                            egui::CornerRadius::ZERO,
                                            egui::Color32::from_rgb(r, g, b),
                                        );
                                    }
                                }
                            }
                        }

                        let mut dep = *departure_index;
                        let mut tof = *tof_index;
                        ui.add(egui::Slider::new(&mut dep, 0..=dep_count.saturating_sub(1)).text("departure"));
                        ui.add(egui::Slider::new(&mut tof, 0..=tof_count.saturating_sub(1)).text("time of flight"));
                        if dep != *departure_index || tof != *tof_index {
                            action = Some(PlannerModalAction::AdjustTof(dep, tof));
                        }
                        if let Some(detail) = last_error {
                            ui.colored_label(egui::Color32::RED, detail);
                        }

                        let dv_at_cell = cell_at_tof(grid, *departure_index, *tof_index).map(|c| c.dv_total_km_s);
                        let report: Option<FeasibilityReport> = match (dv_at_cell, client.ships.get(ship_id)) {
                            (Some(dv), Some(ship)) => Some(feasibility_for_quote(ship, dv, &[])),
                            _ => None,
                        };
                        if let Some(report) = report {
                            ui.label(format!(
                                "Δv ok: {} · fuel ok: {} · thrust/weight ok: {} · thermal ok: {}",
                                report.delta_v_ok, report.fuel_ok, report.thrust_to_weight_ok, report.thermal_ok,
                            ));
                        }
                        let feasible = report.map(|r| r.is_feasible()).unwrap_or(false);
                        if ui.add_enabled(feasible, egui::Button::new("Confirm transfer")).clicked() {
                            action = Some(PlannerModalAction::Confirm);
                        }
                    }
                    PlannerState::Submitting { .. } => {
                        ui.label("Submitting transfer…");
                    }
                    PlannerState::Submitted { .. } => {
                        ui.label("Transfer confirmed.");
                        if ui.button("Close").clicked() {
                            close = true;
                        }
                    }
                }
                if ui.button("Cancel").clicked() {
                    action = Some(PlannerModalAction::Cancel);
                }
            });

        if close {
            client.close_planner();
        }
        if let Some(action) = action {
            self.apply_planner_action(client, action);
        }
    }
}

impl eframe::App for OrbitmapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dt_ms = (ctx.input(|i| i.stable_dt) as f64) * 1000.0;
        let now_real_s = real_now_s();

        let focused = ctx.input(|i| i.focused);
        if self.was_focused && !focused {
            self.client.blocking_lock().dismiss_context_menu(DismissReason::Blur);
        }
        self.was_focused = focused;

        let screen_rect = ctx.input(|i| i.screen_rect());
        if self.last_screen_rect != egui::Rect::NOTHING && self.last_screen_rect != screen_rect {
            self.client.blocking_lock().dismiss_context_menu(DismissReason::Resize);
        }
        self.last_screen_rect = screen_rect;

        let client_handle = self.client.clone();
        let mut client = client_handle.blocking_lock();
        client.tick(dt_ms);
        let now_game_s = client.clock.estimate(now_real_s);

        let ship_ids: Vec<String> = client.scene.ship_ids().cloned().collect();
        let mut ship_world_positions: HashMap<String, Vector2> = HashMap::new();
        for id in &ship_ids {
            let Some(node) = client.scene.ship(id) else { continue };
            let Some(ship) = client.ships.get(id) else { continue };
            let world = if let Some(curve) = &node.curve {
                match (ship.departed_at, ship.arrives_at) {
                    (Some(dep), Some(arr)) if arr > dep => {
                        let t = ((now_game_s - dep) / (arr - dep)).clamp(0.0, 1.0);
                        Some(curve.point(t))
                    }
                    _ => None,
                }
            } else {
                ship.location_id.as_ref().and_then(|loc_id| {
                    client.known_location_positions.get(loc_id).map(|base| {
                        let slot = node.dock_slot.unwrap_or(0) as f64;
                        base.add(Vector2::from_polar(slot * 0.9, 0.6 + slot * 0.15))
                    })
                })
            };
            if let Some(world) = world {
                ship_world_positions.insert(id.clone(), world);
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());

            if response.dragged() {
                let delta = response.drag_delta();
                client.camera.pan(Vector2::new(delta.x as f64, delta.y as f64));
            }
            let scroll = ui.input(|i| i.raw_scroll_delta.y) as f64;
            if scroll.abs() > 0.0 {
                if let Some(pos) = response.hover_pos() {
                    client.camera.zoom_at(Vector2::new(pos.x as f64, pos.y as f64), -scroll);
                }
            }

            let marker_candidates: Vec<LocationMarkerCandidate> = client
                .scene
                .location_ids()
                .filter_map(|id| {
                    let node = client.scene.location(id)?;
                    if !orbitmap_scene::renders_own_marker(node.kind)
                        || matches!(node.kind, LocationKind::ZoneRoot | LocationKind::Planet | LocationKind::Moon)
                    {
                        return None;
                    }
                    client
                        .known_location_positions
                        .get(id)
                        .map(|pos| LocationMarkerCandidate { location_id: id.clone(), world_pos: *pos })
                })
                .collect();
            let body_group_candidates: Vec<BodyGroupCandidate> = client
                .scene
                .location_ids()
                .filter_map(|id| {
                    let node = client.scene.location(id)?;
                    if !matches!(node.kind, LocationKind::ZoneRoot | LocationKind::Planet | LocationKind::Moon) {
                        return None;
                    }
                    client
                        .known_location_positions
                        .get(id)
                        .map(|pos| BodyGroupCandidate { location_id: id.clone(), world_pos: *pos })
                })
                .collect();
            let orbit_ring_candidates: Vec<OrbitRingCandidate> = client
                .scene
                .location_ids()
                .filter_map(|id| {
                    let node = client.scene.location(id)?;
                    let radius = node.orbit_radius_world?;
                    let center = *client.known_location_positions.get(id)?;
                    Some(OrbitRingCandidate { location_id: id.clone(), center, radius })
                })
                .collect();
            let mut docked_at: HashMap<String, Vec<String>> = HashMap::new();
            for id in &ship_ids {
                if let Some(ship) = client.ships.get(id) {
                    if ship.status == orbitmap_api::model::DockStatus::Docked {
                        if let Some(loc_id) = &ship.location_id {
                            docked_at.entry(loc_id.clone()).or_default().push(id.clone());
                        }
                    }
                }
            }
            let chip_candidates: Vec<ChipCandidate> = docked_at
                .keys()
                .filter_map(|loc_id| {
                    client.known_location_positions.get(loc_id).map(|pos| ChipCandidate {
                        location_id: loc_id.clone(),
                        world_pos: *pos,
                        world_radius: 0.8,
                    })
                })
                .collect();
            let ship_candidates: Vec<ShipCandidate> = ship_world_positions
                .iter()
                .map(|(id, pos)| ShipCandidate { id: id.clone(), world_pos: *pos, hit_radius_world: 1.0 })
                .collect();

            // Dust field (back layer, spec §4.5).
            for particle in client.dust_field.particles() {
                let screen = client.camera.world_to_screen(particle.position);
                painter.circle_filled(
                    egui::pos2(screen.x as f32, screen.y as f32),
                    1.0,
                    egui::Color32::from_white_alpha((particle.alpha * 180.0) as u8),
                );
            }

            // Orbit rings.
            for ring in &orbit_ring_candidates {
                let screen_center = client.camera.world_to_screen(ring.center);
                painter.circle_stroke(
                    egui::pos2(screen_center.x as f32, screen_center.y as f32),
                    (ring.radius * client.camera.scale) as f32,
                    egui::Stroke::new(1.0, egui::Color32::from_gray(90)),
                );
            }

            // Bodies and location markers.
            for group in &body_group_candidates {
                let screen = client.camera.world_to_screen(group.world_pos);
                painter.circle_filled(
                    egui::pos2(screen.x as f32, screen.y as f32),
                    6.0,
                    egui::Color32::from_rgb(200, 170, 110),
                );
            }
            for marker in &marker_candidates {
                let screen = client.camera.world_to_screen(marker.world_pos);
                painter.circle_filled(
                    egui::pos2(screen.x as f32, screen.y as f32),
                    3.0,
                    egui::Color32::LIGHT_BLUE,
                );
            }

            // Docked chips.
            for chip in &chip_candidates {
                let screen = client.camera.world_to_screen(chip.world_pos);
                let count = docked_at.get(&chip.location_id).map(Vec::len).unwrap_or(0);
                let rect = egui::Rect::from_center_size(
                    egui::pos2(screen.x as f32 + 14.0, screen.y as f32 - 14.0),
                    egui::vec2(16.0, 14.0),
                );
                painter.rect_filled(rect, egui::CornerRadius::same(2), egui::Color32::from_rgb(40, 40, 60));
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    format!("{count}"),
                    egui::FontId::proportional(10.0),
                    egui::Color32::WHITE,
                );
            }

            // Ships, drawn last so they always sit above the location layers.
            self.ship_screen_positions = ship_world_positions
                .iter()
                .map(|(id, world)| (id.clone(), client.camera.world_to_screen(*world)))
                .collect();
            for (id, screen) in &self.ship_screen_positions {
                let color = client.ships.get(id).map(|s| parse_color_hex(&s.color_hex)).unwrap_or(egui::Color32::WHITE);
                painter.circle_filled(egui::pos2(screen.x as f32, screen.y as f32), 4.0, color);
                painter.text(
                    egui::pos2(screen.x as f32 + 6.0, screen.y as f32 - 6.0),
                    egui::Align2::LEFT_BOTTOM,
                    client.ships.get(id).map(|s| s.name.as_str()).unwrap_or(id.as_str()),
                    egui::FontId::proportional(11.0),
                    egui::Color32::WHITE,
                );
            }

            if response.clicked() {
                if let Some(pos) = response.interact_pointer_pos() {
                    let world = client.camera.screen_to_world(Vector2::new(pos.x as f64, pos.y as f64));
                    let hit = hit_test(&HitTestInput {
                        pointer_world: world,
                        zoom: client.camera.scale,
                        ships: &ship_candidates,
                        chips: &chip_candidates,
                        orbit_rings: &orbit_ring_candidates,
                        location_markers: &marker_candidates,
                        body_groups: &body_group_candidates,
                    });
                    let event = client.select(hit);
                    if let Some(event) = event {
                        self.handle_event(event);
                    }
                }
            }

            if response.secondary_clicked() {
                if let Some(pos) = response.interact_pointer_pos() {
                    let world = client.camera.screen_to_world(Vector2::new(pos.x as f64, pos.y as f64));
                    let hit = hit_test(&HitTestInput {
                        pointer_world: world,
                        zoom: client.camera.scale,
                        ships: &ship_candidates,
                        chips: &chip_candidates,
                        orbit_rings: &orbit_ring_candidates,
                        location_markers: &marker_candidates,
                        body_groups: &body_group_candidates,
                    });
                    if let Some(target) = hit {
                        let options: Vec<ContextMenuOption> = match &target {
                            HitTarget::Ship(id) => {
                                let docked = client
                                    .ships
                                    .get(id)
                                    .map(|s| s.status == orbitmap_api::model::DockStatus::Docked)
                                    .unwrap_or(false);
                                let carries_robonaut_part = client
                                    .ships
                                    .get(id)
                                    .map(|s| s.parts.iter().any(|p| p.contains("robonaut")))
                                    .unwrap_or(false);
                                ship_context_menu(docked, carries_robonaut_part)
                            }
                            HitTarget::DockedChip(loc_id) => {
                                let ids = docked_at.get(loc_id).cloned().unwrap_or_default();
                                chip_context_menu(&ids)
                            }
                            HitTarget::OrbitRing(loc_id) | HitTarget::LocationMarker(loc_id) => {
                                orbit_or_location_context_menu(is_selected_ship_docked_elsewhere(&client, loc_id))
                            }
                            HitTarget::BodyGroup(_) => body_context_menu(client.selection.selected.is_some()),
                        };
                        let anchor = Vector2::new(pos.x as f64, pos.y as f64);
                        let menu_size = Vector2::new(200.0, 26.0 * options.len().max(1) as f64);
                        let viewport = Vector2::new(ui.available_width() as f64, ui.available_height() as f64);
                        let placed = position_menu(anchor, menu_size, viewport, MENU_VIEWPORT_MARGIN_PX);
                        client.open_context_menu(target, placed, options);
                    }
                }
            }
        });

        self.draw_context_menu(ctx, &mut client);
        self.draw_planner_modal(ctx, &mut client);

        if self.window_manager.layout_of(PanelId::Info).open && !self.info_panel.title.is_empty() {
            let mut window = egui::Window::new("Info").id(egui::Id::new("orbitmap_info_panel"));
            if self.window_manager.is_front(PanelId::Info) {
                window = window.order(egui::Order::Foreground);
            }
            window.show(ctx, |ui| {
                ui.heading(self.info_panel.title.as_str());
                if !self.info_panel.subtitle.is_empty() {
                    ui.label(self.info_panel.subtitle.as_str());
                }
                for line in &self.info_panel.items {
                    ui.label(format!("{}: {}", line.label, line.value));
                }
            });
        }

        if self.window_manager.layout_of(PanelId::ShipInfoTabs).open {
            if let Some(HitTarget::Ship(ship_id)) = client.selection.selected.clone() {
                if let Some(ship) = client.ships.get(&ship_id) {
                    let mut window = egui::Window::new("Ship").id(egui::Id::new("orbitmap_ship_info_tabs"));
                    if self.window_manager.is_front(PanelId::ShipInfoTabs) {
                        window = window.order(egui::Order::Foreground);
                    }
                    window.show(ctx, |ui| {
                        ui.heading(ship.name.as_str());
                        ui.label(format!("status: {:?}", ship.status));
                        ui.label(format!("delta-v remaining: {:.2} km/s", ship.delta_v_remaining_km_s));
                        ui.label(format!("fuel mass: {:.0} kg", ship.fuel_mass_kg));
                        if !ship.cargo.is_empty() {
                            ui.separator();
                            for item in &ship.cargo {
                                ui.label(format!("{} x{}", item.name, item.quantity));
                            }
                        }
                    });
                }
            }
        }

        drop(client);
        ctx.request_repaint();
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (config_path, layout_path) = config_paths();
    let config: ClientConfig = orbitmap_config::load_client_config(&config_path).unwrap_or_else(|err| {
        tracing::warn!(%err, "failed to load client config, using defaults");
        ClientConfig::default()
    });

    let api = build_api_client(&config).expect("configured api_base_url must be valid");
    let client: SharedMapClient = Arc::new(Mutex::new(MapClient::new(api.clone(), config.anchor_cache_capacity)));

    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");
    let _guard = runtime.enter();
    spawn_sync_loops(client.clone(), api.clone());

    let app = OrbitmapApp {
        client,
        api,
        info_panel: EguiInfoPanel::default(),
        window_manager: EguiWindowManager::new(layout_path),
        reference_host: EguiReferenceCardHost::default(),
        ship_screen_positions: HashMap::new(),
        last_screen_rect: egui::Rect::NOTHING,
        was_focused: true,
    };

    eframe::run_native(
        "Orbital Map",
        eframe::NativeOptions::default(),
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
