//! World-space projection of raw body-frame coordinates (spec §4.1).
//!
//! Implements the Design Notes' "cyclic references" fix directly: locations are held in an
//! arena of `LocationNode { id, parent_ix }` indices rather than as a graph of owned/shared
//! pointers, so ancestor walks are index arithmetic and nothing here can leak or cycle.

use std::collections::HashMap;

use orbitmap_core::vector::Vector2;

pub type LocationId = String;

/// A location as reported by the server, before projection.
#[derive(Debug, Clone)]
pub struct RawLocation {
    pub id: LocationId,
    pub parent_id: Option<LocationId>,
    pub is_group: bool,
    pub x_km: f64,
    pub y_km: f64,
}

/// One arena-resident location node. `parent_ix` is `None` only for the Sun (the tree root).
#[derive(Debug, Clone)]
pub struct LocationNode {
    pub id: LocationId,
    pub parent_ix: Option<usize>,
    pub is_group: bool,
    pub x_km: f64,
    pub y_km: f64,
}

/// An index-based location tree built fresh from each `/api/locations` poll.
#[derive(Debug, Default)]
pub struct LocationArena {
    nodes: Vec<LocationNode>,
    index_by_id: HashMap<LocationId, usize>,
}

impl LocationArena {
    pub fn build(raw: &[RawLocation]) -> Self {
        let mut index_by_id = HashMap::with_capacity(raw.len());
        for (ix, loc) in raw.iter().enumerate() {
            index_by_id.insert(loc.id.clone(), ix);
        }
        let nodes = raw
            .iter()
            .map(|loc| LocationNode {
                id: loc.id.clone(),
                parent_ix: loc.parent_id.as_ref().and_then(|p| index_by_id.get(p).copied()),
                is_group: loc.is_group,
                x_km: loc.x_km,
                y_km: loc.y_km,
            })
            .collect();
        LocationArena { nodes, index_by_id }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, ix: usize) -> &LocationNode {
        &self.nodes[ix]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    /// Indices from `ix` up to (and including) the root, nearest ancestor first.
    pub fn ancestors(&self, ix: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = self.nodes[ix].parent_ix;
        while let Some(p) = current {
            chain.push(p);
            current = self.nodes[p].parent_ix;
        }
        chain
    }

    /// The id of the Sun node, the sole root (`parent_ix == None`) with `id == "grp_sun"`.
    pub fn sun_index(&self) -> Option<usize> {
        self.index_of("grp_sun")
    }

    /// The nearest ancestor body (a `grp_*` group) of `ix`, not counting `ix` itself.
    pub fn nearest_ancestor_body(&self, ix: usize) -> Option<usize> {
        self.ancestors(ix)
            .into_iter()
            .find(|&a| self.nodes[a].is_group && self.nodes[a].id.starts_with("grp_"))
    }

    /// The nearest ancestor body whose `*_orbits`/`*_moons` sub-group `ix` descends from, if
    /// any — the trigger for local-orbit expansion (rule 1).
    pub fn local_expansion_body(&self, ix: usize) -> Option<usize> {
        let ancestors = self.ancestors(ix);
        let in_local_group = ancestors.iter().any(|&a| {
            let id = &self.nodes[a].id;
            id.ends_with("_orbits") || id.ends_with("_moons") || id.ends_with("_lpoints")
        });
        if !in_local_group {
            return None;
        }
        if is_trojan_lagrange_point(&self.nodes[ix].id) {
            return None;
        }
        self.nearest_ancestor_body(ix)
    }
}

/// Trojan Lagrange points (L4/L5) sit 60° ahead of or behind their primary on its own
/// heliocentric orbit, so — unlike every other Lagrange point — they are projected by the
/// heliocentric rule rather than expanded locally (spec §4.1).
fn is_trojan_lagrange_point(id: &str) -> bool {
    let lower = id.to_ascii_lowercase();
    lower.ends_with("_l4") || lower.ends_with("_l5")
}

/// Projection constants (spec §4.1).
pub mod constants {
    /// World units per kilometre applied to heliocentric positions.
    pub const HELIO_LINEAR: f64 = 1.95e-4;
    /// Multiplier applied on top of `HELIO_LINEAR` for local-orbit expansion, so LEO/HEO/GEO
    /// remain visible at zooms where interplanetary distances are fully compressed.
    pub const LOCAL_EXPANSION_MULT: f64 = 12.0;
    /// Fallback linear scale used when no Sun location is present in the raw set.
    pub const DEEP_SCALE: f64 = 1e-3;
}

/// Project every location in `arena` to world space, in dependency order (root first) so that
/// a moon or local-orbit node can read its body's already-computed position.
pub fn project_all(arena: &LocationArena) -> HashMap<usize, Vector2> {
    use constants::{DEEP_SCALE, HELIO_LINEAR, LOCAL_EXPANSION_MULT};

    let sun_ix = arena.sun_index();
    let mut projected: HashMap<usize, Vector2> = HashMap::with_capacity(arena.len());

    // Depth-first-safe because parents always have a strictly shorter ancestor chain than
    // their children; sorting by chain length guarantees a parent is visited before its
    // children regardless of input order.
    let mut order: Vec<usize> = (0..arena.len()).collect();
    order.sort_by_key(|&ix| arena.ancestors(ix).len());

    for ix in order {
        let node = arena.node(ix);
        let raw = Vector2::new(node.x_km, node.y_km);

        let position = if let Some(body_ix) = arena.local_expansion_body(ix) {
            // Rule 1: local-orbit expansion relative to the body's own projected position.
            let body = arena.node(body_ix);
            let body_raw = Vector2::new(body.x_km, body.y_km);
            let body_rx = projected.get(&body_ix).copied().unwrap_or(Vector2::ZERO);
            let s_local = HELIO_LINEAR * LOCAL_EXPANSION_MULT;
            body_rx.add(raw.sub(body_raw).scale(s_local))
        } else if let Some(sun_ix) = sun_ix {
            // Rule 2: heliocentric linear, preserving angular position from the Sun.
            if ix == sun_ix {
                let sun_rx = projected.get(&sun_ix).copied().unwrap_or(Vector2::ZERO);
                sun_rx
            } else {
                let sun = arena.node(sun_ix);
                let sun_raw = Vector2::new(sun.x_km, sun.y_km);
                let sun_rx = projected.get(&sun_ix).copied().unwrap_or(Vector2::ZERO);
                let offset = raw.sub(sun_raw);
                sun_rx.add(offset.scale(HELIO_LINEAR))
            }
        } else {
            // Rule 3: no Sun known, raw scaling.
            raw.scale(DEEP_SCALE)
        };

        projected.insert(ix, position);
    }

    projected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sun() -> RawLocation {
        RawLocation {
            id: "grp_sun".to_string(),
            parent_id: None,
            is_group: true,
            x_km: 0.0,
            y_km: 0.0,
        }
    }

    fn body(id: &str, x: f64, y: f64) -> RawLocation {
        RawLocation {
            id: id.to_string(),
            parent_id: Some("grp_sun".to_string()),
            is_group: true,
            x_km: x,
            y_km: y,
        }
    }

    #[test]
    fn body_projects_by_heliocentric_rule() {
        let raw = vec![sun(), body("grp_earth", 149_597_870.7, 0.0)];
        let arena = LocationArena::build(&raw);
        let projected = project_all(&arena);
        let earth_ix = arena.index_of("grp_earth").unwrap();
        let earth = projected[&earth_ix];
        assert!((earth.x - 149_597_870.7 * constants::HELIO_LINEAR).abs() < 1e-6);
        assert!(earth.y.abs() < 1e-9);
    }

    #[test]
    fn local_orbit_expansion_distance_matches_s_local_times_raw_offset() {
        let mut raw = vec![sun(), body("grp_earth", 149_597_870.7, 0.0)];
        raw.push(RawLocation {
            id: "grp_earth_orbits".to_string(),
            parent_id: Some("grp_earth".to_string()),
            is_group: true,
            x_km: 149_597_870.7,
            y_km: 0.0,
        });
        raw.push(RawLocation {
            id: "leo_station".to_string(),
            parent_id: Some("grp_earth_orbits".to_string()),
            is_group: false,
            x_km: 149_597_870.7 + 400.0,
            y_km: 0.0,
        });
        let arena = LocationArena::build(&raw);
        let projected = project_all(&arena);

        let earth_ix = arena.index_of("grp_earth").unwrap();
        let leo_ix = arena.index_of("leo_station").unwrap();
        let earth_pos = projected[&earth_ix];
        let leo_pos = projected[&leo_ix];

        let s_local = constants::HELIO_LINEAR * constants::LOCAL_EXPANSION_MULT;
        let expected_distance = 400.0 * s_local;
        let actual_distance = leo_pos.sub(earth_pos).norm();
        assert!((actual_distance - expected_distance).abs() < 1e-6);
    }

    #[test]
    fn missing_sun_falls_back_to_deep_scale() {
        let raw = vec![RawLocation {
            id: "asteroid_x".to_string(),
            parent_id: None,
            is_group: false,
            x_km: 1000.0,
            y_km: 2000.0,
        }];
        let arena = LocationArena::build(&raw);
        let projected = project_all(&arena);
        let ix = arena.index_of("asteroid_x").unwrap();
        let pos = projected[&ix];
        assert!((pos.x - 1000.0 * constants::DEEP_SCALE).abs() < 1e-9);
        assert!((pos.y - 2000.0 * constants::DEEP_SCALE).abs() < 1e-9);
    }

    #[test]
    fn trojan_lagrange_point_uses_heliocentric_rule_not_local_expansion() {
        let mut raw = vec![sun(), body("grp_jupiter", 778_000_000.0, 0.0)];
        raw.push(RawLocation {
            id: "grp_jupiter_lpoints".to_string(),
            parent_id: Some("grp_jupiter".to_string()),
            is_group: true,
            x_km: 778_000_000.0,
            y_km: 0.0,
        });
        raw.push(RawLocation {
            id: "jupiter_l4".to_string(),
            parent_id: Some("grp_jupiter_lpoints".to_string()),
            is_group: false,
            x_km: 389_000_000.0,
            y_km: 673_000_000.0,
        });
        let arena = LocationArena::build(&raw);
        let l4_ix = arena.index_of("jupiter_l4").unwrap();
        assert_eq!(arena.local_expansion_body(l4_ix), None);
    }

    #[test]
    fn reprojecting_unit_scale_identity_is_a_fixed_point() {
        // With S_local = 1 and HELIO_LINEAR = 1, re-projecting an already-projected location
        // whose raw (x, y) is set from its own (rx, ry) is the identity map.
        let raw = vec![
            sun(),
            body("grp_mars", 227_900_000.0, 0.0),
        ];
        let arena = LocationArena::build(&raw);
        let sun_ix = arena.index_of("grp_sun").unwrap();
        let mars_ix = arena.index_of("grp_mars").unwrap();
        let sun_pos = Vector2::ZERO;
        let mars_raw = Vector2::new(arena.node(mars_ix).x_km, arena.node(mars_ix).y_km);
        let unit_scale = 1.0;
        let projected_mars = sun_pos.add(mars_raw.sub(sun_pos).scale(unit_scale));
        assert_eq!(projected_mars, mars_raw);
    }
}
