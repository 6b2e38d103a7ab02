//! Core units, constants, and shared primitives for the orbital-map client workspace.

/// Physical and layout constants expressed in SI-ish units (kilometres, seconds) unless stated otherwise.
pub mod constants {
    /// Standard gravity at Earth's surface (m/s²), used by the Tsiolkovsky feasibility check.
    pub const G0: f64 = 9.80665;
    /// Kilometres per astronomical unit.
    pub const AU_KM: f64 = 149_597_870.7;
    /// Seconds per Julian day.
    pub const SECONDS_PER_DAY: f64 = 86_400.0;
    /// Width of an anchor-snapshot time bucket, in game seconds (6 hours).
    pub const BUCKET_SECONDS: f64 = 21_600.0;
    /// Maximum number of anchor-snapshot buckets retained by the LRU cache.
    pub const ANCHOR_CACHE_CAPACITY: usize = 16;
}

/// Basic unit conversion helpers.
pub mod units {
    /// Convert kilometres to metres.
    #[inline]
    pub fn km_to_m(v: f64) -> f64 {
        v * 1_000.0
    }

    /// Convert metres to kilometres.
    #[inline]
    pub fn m_to_km(v: f64) -> f64 {
        v / 1_000.0
    }

    /// Convert metres per second to kilometres per second.
    #[inline]
    pub fn ms_to_kms(v: f64) -> f64 {
        v / 1_000.0
    }

    /// Convert kilometres per second to metres per second.
    #[inline]
    pub fn kms_to_ms(v: f64) -> f64 {
        v * 1_000.0
    }
}

/// Lightweight time utilities shared across crates.
pub mod time {
    use super::constants::{BUCKET_SECONDS, SECONDS_PER_DAY};

    /// Convert days to seconds.
    #[inline]
    pub fn days_to_seconds(days: f64) -> f64 {
        days * SECONDS_PER_DAY
    }

    /// Convert seconds to days.
    #[inline]
    pub fn seconds_to_days(seconds: f64) -> f64 {
        seconds / SECONDS_PER_DAY
    }

    /// The anchor-snapshot bucket index containing game time `t` (seconds).
    #[inline]
    pub fn bucket(t: f64) -> i64 {
        (t / BUCKET_SECONDS).floor() as i64
    }

    /// The game time at the center of `bucket`, suitable for `/api/locations?dynamic=1&t=`.
    #[inline]
    pub fn bucket_center(bucket: i64) -> f64 {
        bucket as f64 * BUCKET_SECONDS + BUCKET_SECONDS * 0.5
    }
}

/// 2D vector helpers for the world-space projection and curve math.
pub mod vector {
    /// A point or displacement in world space.
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Vector2 {
        pub x: f64,
        pub y: f64,
    }

    impl Vector2 {
        pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Vector2 { x, y }
        }

        #[inline]
        pub fn norm(self) -> f64 {
            self.dot(self).sqrt()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.x * other.x + self.y * other.y
        }

        #[inline]
        pub fn add(self, other: Vector2) -> Vector2 {
            Vector2::new(self.x + other.x, self.y + other.y)
        }

        #[inline]
        pub fn sub(self, other: Vector2) -> Vector2 {
            Vector2::new(self.x - other.x, self.y - other.y)
        }

        #[inline]
        pub fn scale(self, s: f64) -> Vector2 {
            Vector2::new(self.x * s, self.y * s)
        }

        /// Linear interpolation from `self` to `other` at `t` (not clamped).
        #[inline]
        pub fn lerp(self, other: Vector2, t: f64) -> Vector2 {
            self.add(other.sub(self).scale(t))
        }

        /// Unit vector in the same direction, or `ZERO` if `self` is the zero vector.
        #[inline]
        pub fn unit(self) -> Vector2 {
            let n = self.norm();
            if n < f64::EPSILON {
                Vector2::ZERO
            } else {
                self.scale(1.0 / n)
            }
        }

        #[inline]
        pub fn angle(self) -> f64 {
            self.y.atan2(self.x)
        }

        #[inline]
        pub fn from_polar(angle: f64, radius: f64) -> Vector2 {
            Vector2::new(angle.cos() * radius, angle.sin() * radius)
        }

        /// The vector rotated 90° counter-clockwise, used to derive orbital tangents and bend offsets.
        #[inline]
        pub fn perpendicular(self) -> Vector2 {
            Vector2::new(-self.y, self.x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::constants::BUCKET_SECONDS;
    use super::time::{bucket, bucket_center};
    use super::vector::Vector2;

    #[test]
    fn bucket_floors_toward_zero_bucket_width() {
        assert_eq!(bucket(0.0), 0);
        assert_eq!(bucket(BUCKET_SECONDS - 1.0), 0);
        assert_eq!(bucket(BUCKET_SECONDS), 1);
        assert_eq!(bucket(BUCKET_SECONDS * 20.5), 20);
    }

    #[test]
    fn bucket_center_round_trips_into_same_bucket() {
        for b in [0_i64, 1, 5, 400] {
            assert_eq!(bucket(bucket_center(b)), b);
        }
    }

    #[test]
    fn vector2_unit_of_zero_is_zero() {
        assert_eq!(Vector2::ZERO.unit(), Vector2::ZERO);
    }

    #[test]
    fn vector2_lerp_at_zero_and_one() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(10.0, 20.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
    }
}
