//! Scene graph, location classification, and label LOD/collision culling (spec §4.4, §9).

use std::collections::{HashMap, HashSet};

use orbitmap_curves::Curve;
use orbitmap_projection::LocationArena;

pub type LocationId = String;
pub type ShipId = String;

/// A classified location, computed once per sync rather than dispatched on id prefix at draw
/// time (spec §9 "Dynamic shape dispatch on entities").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    ZoneRoot,
    Planet,
    Moon,
    Asteroid,
    Moonlet,
    Lagrange,
    OrbitRing,
    OrbitNode,
    SurfaceSite,
    Generic,
}

/// Classify a location from its arena position alone — id suffix conventions and ancestor
/// chain — so the renderer's icon/body selection becomes a single exhaustive `match`.
pub fn classify(arena: &LocationArena, ix: usize) -> LocationKind {
    let node = arena.node(ix);
    if node.parent_ix.is_none() {
        return LocationKind::ZoneRoot;
    }
    let ancestors = arena.ancestors(ix);
    if node.is_group {
        if node.id.ends_with("_orbits") || node.id.ends_with("_moons") || node.id.ends_with("_lpoints") {
            return LocationKind::OrbitRing;
        }
        if ancestors.iter().any(|&a| arena.node(a).id.ends_with("_moons")) {
            return LocationKind::Moon;
        }
        return LocationKind::Planet;
    }
    if ancestors.iter().any(|&a| arena.node(a).id.ends_with("_lpoints")) {
        return LocationKind::Lagrange;
    }
    if node.id.contains("asteroid") {
        return LocationKind::Asteroid;
    }
    if ancestors.iter().any(|&a| arena.node(a).id.ends_with("_moons")) {
        return LocationKind::Moonlet;
    }
    if ancestors.iter().any(|&a| arena.node(a).id.ends_with("_orbits")) {
        return LocationKind::OrbitNode;
    }
    if ancestors.len() == 1 {
        return LocationKind::SurfaceSite;
    }
    LocationKind::Generic
}

/// Whether `classify` still renders a leaf marker for this kind, or defers entirely to the
/// orbit ring that already draws it (spec §4.4: "All orbit-ring ids skip leaf rendering").
pub fn renders_own_marker(kind: LocationKind) -> bool {
    !matches!(kind, LocationKind::OrbitRing)
}

/// A retained scene record for one location.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub id: LocationId,
    pub kind: LocationKind,
    /// World-space radius of the orbit this location's ring groups, if `kind` is `OrbitRing`
    /// (spec §4.4 "orbit-ring" layer); `None` for every other kind.
    pub orbit_radius_world: Option<f64>,
}

/// A retained scene record for one ship. `curve` is populated while the ship is in transit.
pub struct ShipSceneNode {
    pub id: ShipId,
    pub dock_slot: Option<usize>,
    pub curve: Option<Box<dyn Curve + Send>>,
}

/// Toggles and cadences controlling scene behavior (spec §4.4, §9 Open Questions).
#[derive(Debug, Clone, Copy)]
pub struct SceneConfig {
    /// Docked-ship cluster-count labels below `<= 0.24` zoom. Kept off by default to match the
    /// upstream behavior this was distilled from, where the flag was wired but force-disabled;
    /// both code paths (docked chip and cluster label) stay implemented either way.
    pub cluster_mode_enabled: bool,
    pub label_collision_every_n_frames: u32,
    pub overview_rebuild_every_n_frames: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            cluster_mode_enabled: false,
            label_collision_every_n_frames: 6,
            overview_rebuild_every_n_frames: 10,
        }
    }
}

/// `true` once zoom is shallow enough that individual docked ships at a location should
/// collapse into a single "+N" cluster label rather than the docked-chip badge.
pub fn should_show_cluster_label(config: &SceneConfig, zoom: f64) -> bool {
    config.cluster_mode_enabled && zoom <= 0.24
}

/// The reconciled set of location and ship scene records, kept in sync by id set difference on
/// every sync (spec §9 "Scene-graph records").
#[derive(Default)]
pub struct SceneGraph {
    locations: HashMap<LocationId, SceneNode>,
    ships: HashMap<ShipId, ShipSceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        SceneGraph::default()
    }

    pub fn location(&self, id: &str) -> Option<&SceneNode> {
        self.locations.get(id)
    }

    pub fn location_ids(&self) -> impl Iterator<Item = &LocationId> {
        self.locations.keys()
    }

    pub fn ship(&self, id: &str) -> Option<&ShipSceneNode> {
        self.ships.get(id)
    }

    pub fn ship_ids(&self) -> impl Iterator<Item = &ShipId> {
        self.ships.keys()
    }

    /// Replace the location record set with `fresh`, dropping anything not present in it.
    pub fn reconcile_locations(&mut self, fresh: impl IntoIterator<Item = SceneNode>) {
        let fresh: HashMap<LocationId, SceneNode> = fresh.into_iter().map(|n| (n.id.clone(), n)).collect();
        self.locations.retain(|id, _| fresh.contains_key(id));
        for (id, node) in fresh {
            self.locations.entry(id).or_insert(node);
        }
    }

    /// Replace the ship record set with the ids in `fresh_ids`, dropping stale ships and
    /// inserting bare new ones (callers populate `dock_slot`/`curve` afterward).
    pub fn reconcile_ships(&mut self, fresh_ids: impl IntoIterator<Item = ShipId>) {
        let fresh: HashSet<ShipId> = fresh_ids.into_iter().collect();
        self.ships.retain(|id, _| fresh.contains(id));
        for id in fresh {
            self.ships.entry(id.clone()).or_insert_with(|| ShipSceneNode {
                id,
                dock_slot: None,
                curve: None,
            });
        }
    }

    pub fn set_ship_dock_slot(&mut self, id: &str, slot: Option<usize>) {
        if let Some(ship) = self.ships.get_mut(id) {
            ship.dock_slot = slot;
        }
    }

    /// Attach (or clear) the transit curve driving a ship's animated world position (spec §4.3).
    pub fn set_ship_curve(&mut self, id: &str, curve: Option<Box<dyn Curve + Send>>) {
        if let Some(ship) = self.ships.get_mut(id) {
            ship.curve = curve;
        }
    }
}

/// Collision priorities for label-layer text objects (spec §4.4).
pub mod label_priority {
    pub const SHIP: i32 = 110;
    pub const ID_TAG: i32 = 108;
    pub const ORBIT_HOVER: i32 = 95;
    pub const SHIP_CLUSTER: i32 = 90;
    pub const BODY: i32 = 80;
    pub const LOCATION: i32 = 70;
    pub const GENERIC: i32 = 10;
}

/// An axis-aligned screen-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Rect { x, y, w, h }
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    pub fn padded(&self, pad: f64) -> Rect {
        Rect {
            x: self.x - pad,
            y: self.y - pad,
            w: self.w + 2.0 * pad,
            h: self.h + 2.0 * pad,
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

/// One candidate label for the per-frame collision culling pass.
pub struct LabelCandidate {
    pub id: String,
    pub priority: i32,
    pub bounds: Rect,
    pub alpha: f64,
}

/// Collision padding in screen pixels (spec §4.4).
pub const LABEL_COLLISION_PADDING_PX: f64 = 6.0;

/// Greedily keep the highest-priority, non-overlapping labels (spec §4.4 steps 1-4): sort by
/// `(priority desc, area asc)`, then keep a label only if its padded bounds don't overlap any
/// already-kept label.
pub fn cull_labels(candidates: Vec<LabelCandidate>) -> HashSet<String> {
    let mut candidates: Vec<LabelCandidate> = candidates.into_iter().filter(|c| c.alpha > 0.001).collect();
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.bounds.area().partial_cmp(&b.bounds.area()).unwrap())
    });

    let mut kept_bounds: Vec<Rect> = Vec::new();
    let mut visible = HashSet::new();
    for candidate in candidates {
        let padded = candidate.bounds.padded(LABEL_COLLISION_PADDING_PX);
        if kept_bounds.iter().any(|k| k.overlaps(&padded)) {
            continue;
        }
        kept_bounds.push(padded);
        visible.insert(candidate.id);
    }
    visible
}

/// A zoom-scaled object's local scale stays constant in screen pixels: `(target_px /
/// base_glyph_px) / zoom` (spec §4.4).
pub fn constant_screen_size_scale(target_px: f64, base_glyph_px: f64, zoom: f64) -> f64 {
    (target_px / base_glyph_px) / zoom
}

/// Clamp a zoom-scaled local scale so its rendered screen size never exceeds `cap` (spec §4.4
/// "Screen-size caps").
pub fn capped_scale(local_scale: f64, cap: f64, zoom: f64) -> f64 {
    local_scale.min(cap / zoom)
}

/// Text rasterization resolution: `min(8, max(1, devicePixelRatio * zoom))` (spec §4.4).
pub fn text_resolution(device_pixel_ratio: f64, zoom: f64) -> f64 {
    (device_pixel_ratio * zoom).max(1.0).min(8.0)
}

/// Assign dock slots for the ships docked at one location: explicit slots win, everything else
/// fills the lowest free index in sorted-id order, yielding `{0, ..., n-1}` (spec §8).
pub fn assign_dock_slots(
    explicit: &HashMap<ShipId, usize>,
    ship_ids_sorted: &[ShipId],
) -> HashMap<ShipId, usize> {
    let mut used: HashSet<usize> = explicit.values().copied().collect();
    let mut result = explicit.clone();
    let mut next = 0usize;
    for id in ship_ids_sorted {
        if result.contains_key(id) {
            continue;
        }
        while used.contains(&next) {
            next += 1;
        }
        result.insert(id.clone(), next);
        used.insert(next);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitmap_projection::RawLocation;

    fn raw(id: &str, parent: Option<&str>, is_group: bool) -> RawLocation {
        RawLocation {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            is_group,
            x_km: 0.0,
            y_km: 0.0,
        }
    }

    #[test]
    fn classifies_moon_and_orbit_node_and_lagrange() {
        let arena = LocationArena::build(&[
            raw("grp_sun", None, true),
            raw("grp_earth", Some("grp_sun"), true),
            raw("grp_earth_moons", Some("grp_earth"), true),
            raw("grp_luna", Some("grp_earth_moons"), true),
            raw("grp_earth_orbits", Some("grp_earth"), true),
            raw("leo_station", Some("grp_earth_orbits"), false),
            raw("grp_earth_lpoints", Some("grp_earth"), true),
            raw("earth_l1", Some("grp_earth_lpoints"), false),
        ]);
        assert_eq!(classify(&arena, arena.index_of("grp_sun").unwrap()), LocationKind::ZoneRoot);
        assert_eq!(classify(&arena, arena.index_of("grp_luna").unwrap()), LocationKind::Moon);
        assert_eq!(classify(&arena, arena.index_of("leo_station").unwrap()), LocationKind::OrbitNode);
        assert_eq!(classify(&arena, arena.index_of("earth_l1").unwrap()), LocationKind::Lagrange);
        assert_eq!(
            classify(&arena, arena.index_of("grp_earth_orbits").unwrap()),
            LocationKind::OrbitRing
        );
    }

    #[test]
    fn cull_labels_ship_beats_overlapping_body_label() {
        let candidates = vec![
            LabelCandidate {
                id: "body".to_string(),
                priority: label_priority::BODY,
                bounds: Rect::new(0.0, 0.0, 40.0, 20.0),
                alpha: 1.0,
            },
            LabelCandidate {
                id: "ship".to_string(),
                priority: label_priority::SHIP,
                bounds: Rect::new(5.0, 5.0, 40.0, 20.0),
                alpha: 1.0,
            },
        ];
        let visible = cull_labels(candidates);
        assert!(visible.contains("ship"));
        assert!(!visible.contains("body"));
    }

    #[test]
    fn cull_labels_keeps_non_overlapping_labels_of_any_priority() {
        let candidates = vec![
            LabelCandidate {
                id: "a".to_string(),
                priority: label_priority::GENERIC,
                bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
                alpha: 1.0,
            },
            LabelCandidate {
                id: "b".to_string(),
                priority: label_priority::SHIP,
                bounds: Rect::new(1000.0, 1000.0, 10.0, 10.0),
                alpha: 1.0,
            },
        ];
        let visible = cull_labels(candidates);
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn capped_scale_never_exceeds_cap_over_zoom() {
        let zoom = 0.01;
        let cap = 0.95;
        let local_scale = constant_screen_size_scale(32.0, 16.0, zoom) * 10.0;
        assert!(capped_scale(local_scale, cap, zoom) <= cap / zoom + 1e-9);
    }

    #[test]
    fn dock_slots_form_dense_range_with_explicit_slots_honored() {
        let mut explicit = HashMap::new();
        explicit.insert("ship-c".to_string(), 1usize);
        let sorted = vec!["ship-a".to_string(), "ship-b".to_string(), "ship-c".to_string()];
        let slots = assign_dock_slots(&explicit, &sorted);
        let mut values: Vec<usize> = slots.values().copied().collect();
        values.sort();
        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(slots["ship-c"], 1);
    }

    #[test]
    fn cluster_mode_defaults_to_disabled() {
        let config = SceneConfig::default();
        assert!(!should_show_cluster_label(&config, 0.1));
    }
}
