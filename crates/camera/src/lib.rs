//! Pan/zoom/fly-to camera and the parallax dust field (spec §4.5).

use std::sync::atomic::{AtomicU64, Ordering};

use orbitmap_core::vector::Vector2;

pub const MIN_ZOOM: f64 = 0.001;
pub const MAX_ZOOM: f64 = 60.0;
pub const ZOOM_DELTA_COEFFICIENT: f64 = -0.0015;
pub const FLY_TO_DURATION_MS: f64 = 320.0;
pub const CAMERA_MOTION_DECAY: f64 = 0.86;
pub const ENERGY_DECAY: f64 = 0.9;
pub const DUST_PARTICLE_MIN: usize = 16;
pub const DUST_PARTICLE_MAX: usize = 42;

fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

struct FlyTo {
    token: u64,
    start_translation: Vector2,
    target_world: Vector2,
    viewport_center: Vector2,
    elapsed_ms: f64,
}

/// World-to-screen transform plus an in-flight fly-to tween and motion/energy state used to
/// drive the dust field.
pub struct Camera {
    pub translation: Vector2,
    pub scale: f64,
    pub camera_motion: Vector2,
    pub energy: f64,
    fly_to: Option<FlyTo>,
    generation: AtomicU64,
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            translation: Vector2::ZERO,
            scale: 1.0,
            camera_motion: Vector2::ZERO,
            energy: 0.0,
            fly_to: None,
            generation: AtomicU64::new(0),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Camera::default()
    }

    pub fn world_to_screen(&self, world: Vector2) -> Vector2 {
        world.scale(self.scale).add(self.translation)
    }

    pub fn screen_to_world(&self, screen: Vector2) -> Vector2 {
        screen.sub(self.translation).scale(1.0 / self.scale)
    }

    /// Translate the world container by a pointer-drag delta (spec §4.5 Pan).
    pub fn pan(&mut self, delta_screen: Vector2) {
        self.translation = self.translation.add(delta_screen);
        self.camera_motion = self.camera_motion.add(delta_screen);
        self.energy = 1.0;
    }

    /// Zoom toward `cursor_screen` by wheel delta `delta_y`, clamping scale to `[MIN_ZOOM,
    /// MAX_ZOOM]` and keeping the world point under the cursor fixed (spec §4.5 Zoom).
    pub fn zoom_at(&mut self, cursor_screen: Vector2, delta_y: f64) {
        let scale_factor = (delta_y * ZOOM_DELTA_COEFFICIENT).exp();
        let new_scale = (self.scale * scale_factor).clamp(MIN_ZOOM, MAX_ZOOM);
        if new_scale == self.scale {
            return;
        }
        let world_under_cursor = self.screen_to_world(cursor_screen);
        self.scale = new_scale;
        self.translation = cursor_screen.sub(world_under_cursor.scale(self.scale));
        self.camera_motion = self.camera_motion.add(Vector2::new(0.0, delta_y));
        self.energy = 1.0;
    }

    /// Begin a 320 ms ease-out-cubic pan to center `target_world` on `viewport_center`,
    /// returning the token this tween was assigned. Any previously running tween is
    /// invalidated: its next `tick_fly_to` becomes a no-op.
    pub fn fly_to(&mut self, target_world: Vector2, viewport_center: Vector2) -> u64 {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.fly_to = Some(FlyTo {
            token,
            start_translation: self.translation,
            target_world,
            viewport_center,
            elapsed_ms: 0.0,
        });
        token
    }

    /// Cancel any in-flight fly-to without starting a new one.
    pub fn cancel_fly_to(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.fly_to = None;
    }

    pub fn is_flying(&self) -> bool {
        self.fly_to.is_some()
    }

    /// Advance the in-flight fly-to tween (if any) by `dt_ms`. A no-op if `cancel_fly_to` or a
    /// newer `fly_to` call has superseded it.
    pub fn tick_fly_to(&mut self, dt_ms: f64) {
        let Some(fly) = self.fly_to.as_mut() else { return };
        fly.elapsed_ms += dt_ms;
        let t = (fly.elapsed_ms / FLY_TO_DURATION_MS).clamp(0.0, 1.0);
        let eased = ease_out_cubic(t);
        let target_translation = fly.viewport_center.sub(fly.target_world.scale(self.scale));
        self.translation = fly.start_translation.lerp(target_translation, eased);
        if t >= 1.0 {
            self.fly_to = None;
        }
    }

    /// Decay `camera_motion` and `energy` by one frame (spec §4.5 Parallax + dust).
    pub fn decay_motion(&mut self) {
        self.camera_motion = self.camera_motion.scale(CAMERA_MOTION_DECAY);
        self.energy *= ENERGY_DECAY;
    }
}

/// A deterministic xorshift generator, so the dust field is reproducible in tests without
/// pulling in a dependency the teacher's workspace never used.
struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    fn new(seed: u64) -> Self {
        Xorshift64 { state: seed.max(1) }
    }

    fn next_f64(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DustParticle {
    pub position: Vector2,
    pub velocity: Vector2,
    pub alpha: f64,
}

/// A pool of drifting particles whose alpha and velocity respond to camera motion/energy,
/// giving the parallax "inertia" feel (spec §4.5).
pub struct DustField {
    particles: Vec<DustParticle>,
}

/// Clamp a requested particle count to the spec's `[16, 42]` pool size.
pub fn clamp_particle_count(requested: usize) -> usize {
    requested.clamp(DUST_PARTICLE_MIN, DUST_PARTICLE_MAX)
}

impl DustField {
    pub fn new(seed: u64, requested_count: usize, bounds: Vector2) -> Self {
        let count = clamp_particle_count(requested_count);
        let mut rng = Xorshift64::new(seed);
        let particles = (0..count)
            .map(|_| DustParticle {
                position: Vector2::new(rng.next_f64() * bounds.x, rng.next_f64() * bounds.y),
                velocity: Vector2::ZERO,
                alpha: 0.2,
            })
            .collect();
        DustField { particles }
    }

    pub fn particles(&self) -> &[DustParticle] {
        &self.particles
    }

    /// Nudge velocity by camera motion, integrate position, and boost alpha with `energy`.
    pub fn update(&mut self, camera_motion: Vector2, energy: f64, dt_s: f64) {
        let target_alpha = (0.2 + energy * 0.8).clamp(0.0, 1.0);
        for particle in &mut self.particles {
            particle.velocity = particle.velocity.add(camera_motion.scale(0.02));
            particle.position = particle.position.add(particle.velocity.scale(dt_s));
            particle.alpha = target_alpha;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_clamps_exactly_at_bounds_and_further_deltas_are_no_ops() {
        let mut camera = Camera::new();
        camera.scale = MAX_ZOOM;
        let before = camera.translation;
        camera.zoom_at(Vector2::new(100.0, 100.0), -100_000.0);
        assert_eq!(camera.scale, MAX_ZOOM);
        assert_eq!(camera.translation, before);

        camera.scale = MIN_ZOOM;
        let before = camera.translation;
        camera.zoom_at(Vector2::new(100.0, 100.0), 100_000.0);
        assert_eq!(camera.scale, MIN_ZOOM);
        assert_eq!(camera.translation, before);
    }

    #[test]
    fn zoom_keeps_world_point_under_cursor_fixed() {
        let mut camera = Camera::new();
        let cursor = Vector2::new(400.0, 300.0);
        let world_before = camera.screen_to_world(cursor);
        camera.zoom_at(cursor, -120.0);
        let world_after = camera.screen_to_world(cursor);
        assert!((world_before.x - world_after.x).abs() < 1e-9);
        assert!((world_before.y - world_after.y).abs() < 1e-9);
    }

    #[test]
    fn fly_to_reaches_target_centered_at_completion() {
        let mut camera = Camera::new();
        let viewport_center = Vector2::new(640.0, 360.0);
        let target = Vector2::new(1000.0, -500.0);
        camera.fly_to(target, viewport_center);
        camera.tick_fly_to(FLY_TO_DURATION_MS);
        let screen_pos = camera.world_to_screen(target);
        assert!((screen_pos.x - viewport_center.x).abs() < 0.5);
        assert!((screen_pos.y - viewport_center.y).abs() < 0.5);
        assert!(!camera.is_flying());
    }

    #[test]
    fn a_second_fly_to_invalidates_the_first_tokenwise() {
        let mut camera = Camera::new();
        let token_a = camera.fly_to(Vector2::new(10.0, 0.0), Vector2::ZERO);
        let token_b = camera.fly_to(Vector2::new(20.0, 0.0), Vector2::ZERO);
        assert_ne!(token_a, token_b);
    }

    #[test]
    fn motion_and_energy_decay_by_their_documented_factors() {
        let mut camera = Camera::new();
        camera.camera_motion = Vector2::new(10.0, 0.0);
        camera.energy = 1.0;
        camera.decay_motion();
        assert!((camera.camera_motion.x - 10.0 * CAMERA_MOTION_DECAY).abs() < 1e-9);
        assert!((camera.energy - ENERGY_DECAY).abs() < 1e-9);
    }

    #[test]
    fn dust_particle_count_is_clamped_to_spec_range() {
        let field = DustField::new(42, 5, Vector2::new(800.0, 600.0));
        assert_eq!(field.particles().len(), DUST_PARTICLE_MIN);
        let field = DustField::new(42, 1000, Vector2::new(800.0, 600.0));
        assert_eq!(field.particles().len(), DUST_PARTICLE_MAX);
    }
}
