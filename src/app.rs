//! The application layer: the `MapClient` aggregate, the host-UI traits the core depends on but
//! does not implement, and the top-level event enum (spec §6, §9 "Global mutable state").

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use orbitmap_api::model::{LocationTreeNode, Ship};
use orbitmap_api::{ApiClient, ApiError};
use orbitmap_camera::{Camera, DustField};
use orbitmap_config::ConfigError;
use orbitmap_core::vector::Vector2;
use orbitmap_interaction::{ContextMenuOption, DismissReason, HitTarget};
use orbitmap_planner::{AccordionState, PlannerEvent, PlannerState};
use orbitmap_scene::SceneGraph;
use orbitmap_sync::{estimate_server_time, AnchorOrchestrator, LocationInterpolationSet};

/// Errors that cross the `eframe` host boundary, matching every other crate's `thiserror`
/// convention rather than a bespoke `Box<dyn Error>` (spec §7).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not reach the configured game server: {0}")]
    Api(#[from] ApiError),
    #[error("could not load client configuration: {0}")]
    Config(#[from] ConfigError),
}

/// One row of an `InfoPanel` list (spec §6 `infoList`).
#[derive(Debug, Clone)]
pub struct InfoLine {
    pub label: String,
    pub value: String,
}

/// A named docking point for the browser client's floating panels (spec §6 "Info panel DOM
/// ids"). The GUI layer keeps one `PanelLayout` per variant in its `PanelLayoutStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelId {
    Info,
    Overview,
    ZoneJumpBar,
    ShipInfoTabs,
    RealWorldRef,
    Org,
}

/// The selection/detail surface. Implemented by the `eframe` host; the core never draws it
/// directly so it stays headlessly testable (spec §6 "Rust realization").
pub trait InfoPanel {
    fn set_title(&mut self, title: &str);
    fn set_subtitle(&mut self, subtitle: &str);
    fn set_list(&mut self, items: Vec<InfoLine>);
    fn clear(&mut self);
}

/// Open/close/minimize/z-order for the floating panel set.
pub trait WindowManager {
    fn open(&mut self, panel: PanelId);
    fn close(&mut self, panel: PanelId);
    fn minimize(&mut self, panel: PanelId);
    fn bring_to_front(&mut self, panel: PanelId);
}

/// The "real-world reference" card shown for a selected location's `wiki_hint`.
pub trait ReferenceCardHost {
    fn show_reference(&mut self, location_id: &str);
}

/// Top-level events the host UI reacts to outside the normal per-frame render path (spec §7).
#[derive(Debug, Clone)]
pub enum AppEvent {
    RendererLost,
    RendererRestored,
    SessionExpired,
    Selected(HitTarget),
    Deselected,
}

/// Which entity, if any, the pointer is currently hovering or has selected.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub selected: Option<HitTarget>,
    pub hovered: Option<HitTarget>,
}

/// A right-click context menu pending display, positioned and populated by the host UI (spec
/// §4.6).
#[derive(Debug, Clone)]
pub struct ContextMenuState {
    pub target: HitTarget,
    pub screen_pos: Vector2,
    pub options: Vec<ContextMenuOption>,
}

/// Tracks the server/client real-time relationship so the render loop can estimate "now" in game
/// seconds between `/api/state` polls (spec §4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerClock {
    sync_game_s: f64,
    sync_real_s: f64,
    time_scale: f64,
}

impl ServerClock {
    pub fn sync(&mut self, server_time: f64, time_scale: f64, real_now_s: f64) {
        self.sync_game_s = server_time;
        self.sync_real_s = real_now_s;
        self.time_scale = time_scale;
    }

    pub fn estimate(&self, real_now_s: f64) -> f64 {
        estimate_server_time(self.sync_game_s, self.sync_real_s, real_now_s, self.time_scale)
    }
}

/// All process-wide mutable state for one map canvas, replacing the module-level globals of the
/// browser client (spec §9 "Global mutable state"). One instance per canvas; constructed once in
/// `main`, `update` called once per frame.
pub struct MapClient {
    pub camera: Camera,
    pub dust_field: DustField,
    pub scene: SceneGraph,
    pub selection: Selection,
    pub interpolations: LocationInterpolationSet,
    pub anchors: Arc<AnchorOrchestrator>,
    pub api: ApiClient,
    pub known_location_positions: HashMap<String, Vector2>,
    /// The last `/api/state` snapshot, keyed by ship id, consumed by both the render loop and the
    /// transfer planner (spec §4.8).
    pub ships: HashMap<String, Ship>,
    pub clock: ServerClock,
    pub planner: PlannerState,
    pub planner_modal_open: bool,
    pub planner_tree: Vec<LocationTreeNode>,
    pub planner_accordion: AccordionState,
    pub context_menu: Option<ContextMenuState>,
}

impl MapClient {
    pub fn new(api: ApiClient, anchor_cache_capacity: usize) -> Self {
        MapClient {
            camera: Camera::new(),
            dust_field: DustField::new(1, 24, Vector2::new(1280.0, 720.0)),
            scene: SceneGraph::new(),
            selection: Selection::default(),
            interpolations: LocationInterpolationSet::new(),
            anchors: Arc::new(AnchorOrchestrator::new(anchor_cache_capacity)),
            api,
            known_location_positions: HashMap::new(),
            ships: HashMap::new(),
            clock: ServerClock::default(),
            planner: PlannerState::Idle,
            planner_modal_open: false,
            planner_tree: Vec::new(),
            planner_accordion: AccordionState::new(),
            context_menu: None,
        }
    }

    /// Advance per-frame animation state: the fly-to tween and the camera-motion/energy decay
    /// driving the parallax dust field (spec §4.5).
    pub fn tick(&mut self, dt_ms: f64) {
        self.camera.tick_fly_to(dt_ms);
        self.camera.decay_motion();
        self.dust_field.update(self.camera.camera_motion, self.camera.energy, dt_ms / 1000.0);
    }

    pub fn select(&mut self, target: Option<HitTarget>) -> Option<AppEvent> {
        self.selection.selected = target.clone();
        Some(match target {
            Some(t) => AppEvent::Selected(t),
            None => AppEvent::Deselected,
        })
    }

    /// Advance the transfer planner's state machine by one event (spec §4.8, §9 "Coroutine-style
    /// flows"). `PlannerState::apply` is consuming, so the current state is swapped out first.
    pub fn dispatch_planner_event(&mut self, event: PlannerEvent) {
        let current = std::mem::replace(&mut self.planner, PlannerState::Idle);
        self.planner = current.apply(event);
    }

    /// Open the planner modal with a freshly fetched destination tree, leaving its state machine
    /// at `Idle` until the player picks a destination.
    pub fn open_planner(&mut self, tree: Vec<LocationTreeNode>) {
        self.planner_tree = tree;
        self.planner_modal_open = true;
    }

    pub fn close_planner(&mut self) {
        self.planner_modal_open = false;
        self.planner = PlannerState::Idle;
    }

    pub fn open_context_menu(&mut self, target: HitTarget, screen_pos: Vector2, options: Vec<ContextMenuOption>) {
        self.context_menu = Some(ContextMenuState { target, screen_pos, options });
    }

    /// Close any open context menu. `reason` carries no state today but keeps every call site
    /// naming which of the spec's four dismissal triggers fired (spec §4.6).
    pub fn dismiss_context_menu(&mut self, reason: DismissReason) {
        if self.context_menu.is_some() {
            tracing::trace!(?reason, "dismissing context menu");
        }
        self.context_menu = None;
    }
}

/// Shared handle wiring a `MapClient` to the async runtime driving `orbitmap_sync`'s periodic
/// polls; the `eframe::App` impl in `main.rs` holds one of these and locks it once per frame.
pub type SharedMapClient = Arc<Mutex<MapClient>>;
