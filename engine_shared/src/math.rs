//! Angle math.
//!
//! View angles are kept in degrees on the client and quantized to 16-bit
//! "short angles" (a full turn is 65536 units) on the wire.
//! This module intentionally stays small and deterministic.

/// Index of pitch (up/down) in an angle triple.
pub const PITCH: usize = 0;
/// Index of yaw (left/right) in an angle triple.
pub const YAW: usize = 1;
/// Index of roll in an angle triple.
pub const ROLL: usize = 2;

/// Pitch limit, in degrees, applied after server delta correction.
pub const PITCH_LIMIT: f32 = 89.0;

/// View angles in degrees.
pub type Angles = [f32; 3];

/// Quantizes degrees to a short angle, wrapping modulo a full turn.
pub fn angle_to_short(degrees: f32) -> i16 {
    let units = (degrees * 65536.0 / 360.0) as i32;
    (units & 0xffff) as u16 as i16
}

/// Expands a short angle to degrees in `[-180, 180)`.
pub fn short_to_angle(short: i16) -> f32 {
    short as f32 * (360.0 / 65536.0)
}

/// Expands a short angle to degrees in `[0, 360)`, the way the server
/// stores delta angles.
pub fn short_to_angle_unsigned(short: i16) -> f32 {
    short as u16 as f32 * (360.0 / 65536.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_quarter_turns() {
        assert_eq!(angle_to_short(0.0), 0);
        assert_eq!(angle_to_short(90.0), 16384);
        assert_eq!(angle_to_short(180.0), i16::MIN);
        assert_eq!(angle_to_short(-90.0), -16384);
        assert_eq!(angle_to_short(360.0), 0);
    }

    #[test]
    fn short_roundtrip_within_one_unit() {
        for deg in [-89.0f32, -45.5, 0.25, 33.3, 89.0] {
            let back = short_to_angle(angle_to_short(deg));
            assert!((back - deg).abs() < 360.0 / 65536.0 * 1.01, "{deg} -> {back}");
        }
    }

    #[test]
    fn unsigned_expansion_of_negative_short() {
        assert_eq!(short_to_angle_unsigned(-16384), 270.0);
        assert_eq!(short_to_angle(-16384), -90.0);
    }
}
