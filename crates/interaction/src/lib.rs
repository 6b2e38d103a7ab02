//! Priority-ordered hit testing and context-menu population (spec §4.6).

use orbitmap_core::vector::Vector2;

/// Minimum ship hit radius in screen pixels, widened to the ship's own hit area if larger.
pub const MIN_SHIP_HIT_SCREEN_PX: f64 = 18.0;
/// Minimum leaf-location hit radius in screen pixels.
pub const MIN_LOC_HIT_SCREEN_PX: f64 = 10.0;
/// Orbit-ring hit tolerance in screen pixels either side of the ring's radius.
pub const ORBIT_RING_HIT_SCREEN_PX: f64 = 16.0;
/// Body-group hit radius in screen pixels.
pub const BODY_GROUP_HIT_SCREEN_PX: f64 = 24.0;
/// Context-menu viewport margin in screen pixels.
pub const MENU_VIEWPORT_MARGIN_PX: f64 = 10.0;

pub struct ShipCandidate {
    pub id: String,
    pub world_pos: Vector2,
    /// The ship's own hit-area radius in world units; the effective test radius is never
    /// smaller than `MIN_SHIP_HIT_SCREEN_PX / zoom`.
    pub hit_radius_world: f64,
}

pub struct ChipCandidate {
    pub location_id: String,
    pub world_pos: Vector2,
    pub world_radius: f64,
}

pub struct OrbitRingCandidate {
    pub location_id: String,
    pub center: Vector2,
    pub radius: f64,
}

pub struct LocationMarkerCandidate {
    pub location_id: String,
    pub world_pos: Vector2,
}

pub struct BodyGroupCandidate {
    pub location_id: String,
    pub world_pos: Vector2,
}

pub struct HitTestInput<'a> {
    pub pointer_world: Vector2,
    pub zoom: f64,
    pub ships: &'a [ShipCandidate],
    pub chips: &'a [ChipCandidate],
    pub orbit_rings: &'a [OrbitRingCandidate],
    pub location_markers: &'a [LocationMarkerCandidate],
    pub body_groups: &'a [BodyGroupCandidate],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitTarget {
    Ship(String),
    DockedChip(String),
    OrbitRing(String),
    LocationMarker(String),
    BodyGroup(String),
}

fn nearest_within<'a, T>(
    items: &'a [T],
    pointer: Vector2,
    pos: impl Fn(&T) -> Vector2,
    radius: impl Fn(&T) -> f64,
) -> Option<&'a T> {
    items
        .iter()
        .filter(|item| pointer.sub(pos(item)).norm() <= radius(item))
        .min_by(|a, b| {
            pointer
                .sub(pos(a))
                .norm()
                .partial_cmp(&pointer.sub(pos(b)).norm())
                .unwrap()
        })
}

/// Resolve a single hit target for a pointer event, trying each layer in priority order (spec
/// §4.6): ship, then docked chip, then orbit ring, then location marker, then body group.
pub fn hit_test(input: &HitTestInput) -> Option<HitTarget> {
    if let Some(ship) = nearest_within(
        input.ships,
        input.pointer_world,
        |s| s.world_pos,
        |s| (MIN_SHIP_HIT_SCREEN_PX / input.zoom).max(s.hit_radius_world),
    ) {
        return Some(HitTarget::Ship(ship.id.clone()));
    }

    if let Some(chip) = nearest_within(
        input.chips,
        input.pointer_world,
        |c| c.world_pos,
        |c| c.world_radius,
    ) {
        return Some(HitTarget::DockedChip(chip.location_id.clone()));
    }

    let ring_tolerance = ORBIT_RING_HIT_SCREEN_PX / input.zoom;
    if let Some(ring) = input
        .orbit_rings
        .iter()
        .map(|r| (r, (input.pointer_world.sub(r.center).norm() - r.radius).abs()))
        .filter(|(_, diff)| *diff <= ring_tolerance)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(r, _)| r)
    {
        return Some(HitTarget::OrbitRing(ring.location_id.clone()));
    }

    if let Some(marker) = nearest_within(
        input.location_markers,
        input.pointer_world,
        |m| m.world_pos,
        |_| MIN_LOC_HIT_SCREEN_PX / input.zoom,
    ) {
        return Some(HitTarget::LocationMarker(marker.location_id.clone()));
    }

    if let Some(group) = nearest_within(
        input.body_groups,
        input.pointer_world,
        |g| g.world_pos,
        |_| BODY_GROUP_HIT_SCREEN_PX / input.zoom,
    ) {
        return Some(HitTarget::BodyGroup(group.location_id.clone()));
    }

    None
}

/// One row of a right-click context menu.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenuOption {
    pub id: String,
    pub label: String,
    pub enabled: bool,
}

fn opt(id: &str, label: &str, enabled: bool) -> ContextMenuOption {
    ContextMenuOption { id: id.to_string(), label: label.to_string(), enabled }
}

/// Context menu for a right-clicked ship (spec §4.6).
pub fn ship_context_menu(docked: bool, carries_robonaut_part: bool) -> Vec<ContextMenuOption> {
    vec![
        opt("select", "Select", true),
        opt("details", "View Details", true),
        opt("hangar", "Open Hangar", true),
        opt("plan_transfer", "Plan Transfer", docked),
        opt("prospect", "Prospect", docked && carries_robonaut_part),
    ]
}

/// Context menu for a right-clicked docked chip: one row per docked ship, each of which opens
/// that ship's own context menu on a nested right-click (represented here by id only; the
/// nested menu is obtained by calling `ship_context_menu` again for the selected row).
pub fn chip_context_menu(docked_ship_ids: &[String]) -> Vec<ContextMenuOption> {
    docked_ship_ids
        .iter()
        .map(|id| opt(id, id, true))
        .collect()
}

/// Context menu for a right-clicked orbit ring or location marker.
pub fn orbit_or_location_context_menu(selected_ship_docked_elsewhere: bool) -> Vec<ContextMenuOption> {
    vec![
        opt("details", "View Details", true),
        opt("move_here", "Move here…", selected_ship_docked_elsewhere),
    ]
}

/// Context menu for a right-clicked body group.
pub fn body_context_menu(ship_is_selected: bool) -> Vec<ContextMenuOption> {
    let label = if ship_is_selected {
        "View Details (select a destination location to move there)"
    } else {
        "View Details"
    };
    vec![opt("details", label, true)]
}

/// Position a context menu within viewport bounds with a margin, flipping to the opposite side
/// of the anchor when it would otherwise overflow (spec §4.6).
pub fn position_menu(anchor: Vector2, menu_size: Vector2, viewport: Vector2, margin: f64) -> Vector2 {
    let mut x = anchor.x;
    let mut y = anchor.y;
    if x + menu_size.x + margin > viewport.x {
        x = (viewport.x - menu_size.x - margin).max(margin);
    }
    if y + menu_size.y + margin > viewport.y {
        y = (viewport.y - menu_size.y - margin).max(margin);
    }
    Vector2::new(x.max(margin), y.max(margin))
}

/// Reasons a context menu or modal closes itself (spec §4.6): all of them are unconditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    Escape,
    Blur,
    Resize,
    OutsidePointerDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ship_hit_takes_priority_over_coincident_location_marker() {
        let ships = vec![ShipCandidate {
            id: "ship-1".to_string(),
            world_pos: Vector2::new(0.0, 0.0),
            hit_radius_world: 1.0,
        }];
        let markers = vec![LocationMarkerCandidate {
            location_id: "loc-1".to_string(),
            world_pos: Vector2::new(0.0, 0.0),
        }];
        let input = HitTestInput {
            pointer_world: Vector2::new(0.0, 0.0),
            zoom: 1.0,
            ships: &ships,
            chips: &[],
            orbit_rings: &[],
            location_markers: &markers,
            body_groups: &[],
        };
        assert_eq!(hit_test(&input), Some(HitTarget::Ship("ship-1".to_string())));
    }

    #[test]
    fn orbit_ring_hit_requires_being_within_tolerance_of_radius() {
        let rings = vec![OrbitRingCandidate {
            location_id: "ring-1".to_string(),
            center: Vector2::ZERO,
            radius: 100.0,
        }];
        let near = HitTestInput {
            pointer_world: Vector2::new(101.0, 0.0),
            zoom: 1.0,
            ships: &[],
            chips: &[],
            orbit_rings: &rings,
            location_markers: &[],
            body_groups: &[],
        };
        assert_eq!(hit_test(&near), Some(HitTarget::OrbitRing("ring-1".to_string())));

        let far = HitTestInput {
            pointer_world: Vector2::new(150.0, 0.0),
            zoom: 1.0,
            ships: &[],
            chips: &[],
            orbit_rings: &rings,
            location_markers: &[],
            body_groups: &[],
        };
        assert_eq!(hit_test(&far), None);
    }

    #[test]
    fn body_group_is_the_fallback_target() {
        let groups = vec![BodyGroupCandidate {
            location_id: "grp_mars".to_string(),
            world_pos: Vector2::new(5.0, 5.0),
        }];
        let input = HitTestInput {
            pointer_world: Vector2::new(5.0, 5.0),
            zoom: 1.0,
            ships: &[],
            chips: &[],
            orbit_rings: &[],
            location_markers: &[],
            body_groups: &groups,
        };
        assert_eq!(hit_test(&input), Some(HitTarget::BodyGroup("grp_mars".to_string())));
    }

    #[test]
    fn ship_context_menu_disables_transfer_and_prospect_when_not_docked() {
        let menu = ship_context_menu(false, true);
        let plan = menu.iter().find(|o| o.id == "plan_transfer").unwrap();
        let prospect = menu.iter().find(|o| o.id == "prospect").unwrap();
        assert!(!plan.enabled);
        assert!(!prospect.enabled);
    }

    #[test]
    fn menu_position_clamps_inside_viewport_with_margin() {
        let pos = position_menu(
            Vector2::new(790.0, 590.0),
            Vector2::new(200.0, 150.0),
            Vector2::new(800.0, 600.0),
            MENU_VIEWPORT_MARGIN_PX,
        );
        assert!(pos.x + 200.0 + MENU_VIEWPORT_MARGIN_PX <= 800.0 + 1e-9);
        assert!(pos.y + 150.0 + MENU_VIEWPORT_MARGIN_PX <= 600.0 + 1e-9);
        assert!(pos.x >= MENU_VIEWPORT_MARGIN_PX - 1e-9);
        assert!(pos.y >= MENU_VIEWPORT_MARGIN_PX - 1e-9);
    }
}
