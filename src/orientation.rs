//! Camera orientation: device sensor + manual orbit + user offset.
//!
//! The sensor reports absolute quaternions while the orbit control
//! accumulates yaw/pitch angles. Writing the sensor quaternion straight into
//! the camera would discard every drag, so each tick the sensor pose is turned
//! into angles, diffed against the previous tick, and the difference is fed
//! to the orbit control as an ordinary rotate call.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::surface::Transform;

/// Orbit pitch stays this far from straight up/down.
const POLE_EPSILON: f32 = 1e-3;
/// Threshold of `x·y + z·w` beyond which the general formula is unstable.
const SINGULARITY: f32 = 0.499;

/// Comfort offset applied on top of the tracked orientation, radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Euler {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Euler {
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Yaw about Y, then pitch about X, then roll about Z.
    pub fn to_quat(self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, self.roll)
    }

    fn clamped(self) -> Self {
        Self {
            pitch: self.pitch.clamp(-FRAC_PI_2, FRAC_PI_2),
            ..self
        }
    }
}

/// Angles extracted from a sensor quaternion.
///
/// `yaw` is the heading about the up axis, `roll` the rotation about X that
/// tilts the view up or down, `pitch` the rotation about the view axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorAngles {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Closed-form quaternion to angle conversion with explicit pole branches.
pub fn quat_to_angles(q: Quat) -> SensorAngles {
    let (x, y, z, w) = (q.x, q.y, q.z, q.w);
    let test = x * y + z * w;

    if test > SINGULARITY {
        return SensorAngles {
            yaw: 2.0 * x.atan2(w),
            pitch: FRAC_PI_2,
            roll: 0.0,
        };
    }
    if test < -SINGULARITY {
        return SensorAngles {
            yaw: -2.0 * x.atan2(w),
            pitch: -FRAC_PI_2,
            roll: 0.0,
        };
    }

    let (sqx, sqy, sqz) = (x * x, y * y, z * z);
    SensorAngles {
        yaw: (2.0 * y * w - 2.0 * x * z).atan2(1.0 - 2.0 * sqy - 2.0 * sqz),
        pitch: (2.0 * test).clamp(-1.0, 1.0).asin(),
        roll: (2.0 * x * w - 2.0 * y * z).atan2(1.0 - 2.0 * sqx - 2.0 * sqz),
    }
}

/// Wrap an angle difference into `(-PI, PI]`.
fn wrap_angle(a: f32) -> f32 {
    let wrapped = (a + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

// ── Orbit control ────────────────────────────────────────────

/// Angle-accumulating look control for a camera at the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControl {
    yaw: f32,
    pitch: f32,
    pending_yaw: f32,
    pending_pitch: f32,
    /// Fraction of the pending rotation applied per 60 Hz frame. `None`
    /// applies input immediately.
    damping: Option<f32>,
    /// Symmetric yaw limit around forward, for layouts without a back half.
    azimuth_limit: Option<f32>,
}

impl OrbitControl {
    pub fn new(damping: Option<f32>) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            pending_yaw: 0.0,
            pending_pitch: 0.0,
            damping: damping.map(|d| d.clamp(0.0, 1.0)),
            azimuth_limit: None,
        }
    }

    /// Turn the view left (positive) or right (negative).
    pub fn rotate_left(&mut self, angle: f32) {
        self.pending_yaw += angle;
    }

    /// Tilt the view up (positive) or down (negative).
    pub fn rotate_up(&mut self, angle: f32) {
        self.pending_pitch += angle;
    }

    pub fn set_azimuth_limit(&mut self, limit: Option<f32>) {
        self.azimuth_limit = limit;
        self.clamp();
    }

    pub fn update(&mut self, dt: f32) {
        let factor = match self.damping {
            Some(d) if dt > 0.0 => 1.0 - (1.0 - d).powf(dt * 60.0),
            Some(_) => 0.0,
            None => 1.0,
        };

        let (dy, dp) = (self.pending_yaw * factor, self.pending_pitch * factor);
        self.yaw += dy;
        self.pitch += dp;
        self.pending_yaw -= dy;
        self.pending_pitch -= dp;
        self.clamp();
    }

    fn clamp(&mut self) {
        match self.azimuth_limit {
            Some(limit) => self.yaw = self.yaw.clamp(-limit, limit),
            None => self.yaw = wrap_angle(self.yaw),
        }
        let max_pitch = FRAC_PI_2 - POLE_EPSILON;
        self.pitch = self.pitch.clamp(-max_pitch, max_pitch);
    }

    /// Back to looking straight ahead.
    pub fn reset(&mut self) {
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.pending_yaw = 0.0;
        self.pending_pitch = 0.0;
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }
}

impl Default for OrbitControl {
    fn default() -> Self {
        Self::new(None)
    }
}

// ── Controller ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    /// No orientation sensor on this platform.
    Unavailable,
    /// The user refused sensor access.
    Denied,
    Active,
}

/// Orientation inputs and history, mutated once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationState {
    pub sensor_quaternion: Option<Quat>,
    pub user_offset: Euler,
    pub last_sensor_angles: Option<SensorAngles>,
}

impl Default for OrientationState {
    fn default() -> Self {
        Self {
            sensor_quaternion: None,
            user_offset: Euler::ZERO,
            last_sensor_angles: None,
        }
    }
}

/// Point on a sphere of `distance` around the viewer in the offset direction.
pub fn offset_position(offset: Euler, distance: f32) -> Vec3 {
    let (sy, cy) = offset.yaw.sin_cos();
    let (sp, cp) = offset.pitch.sin_cos();
    Vec3::new(-sy * cp, sp, -cy * cp) * distance
}

#[derive(Debug, Clone)]
pub struct OrientationController {
    state: OrientationState,
    orbit: OrbitControl,
    sensor: SensorState,
    /// Extra gain on sensor deltas, applied as `1 + speed`.
    speed: f32,
    /// Distance of the flat screen while a flat layout is active.
    flat_distance: Option<f32>,
    camera: Quat,
}

impl OrientationController {
    pub fn new(speed: f32, damping: Option<f32>) -> Self {
        Self {
            state: OrientationState::default(),
            orbit: OrbitControl::new(damping),
            sensor: SensorState::Unavailable,
            speed,
            flat_distance: None,
            camera: Quat::IDENTITY,
        }
    }

    pub fn orbit(&self) -> &OrbitControl {
        &self.orbit
    }

    pub fn sensor_state(&self) -> SensorState {
        self.sensor
    }

    pub fn camera(&self) -> Quat {
        self.camera
    }

    /// Record the outcome of a sensor permission request.
    pub fn set_sensor_permission(&mut self, granted: bool) {
        self.sensor = if granted {
            SensorState::Active
        } else {
            log::info!("orientation sensor not permitted, using drag control only");
            SensorState::Denied
        };
        self.state.last_sensor_angles = None;
        self.state.sensor_quaternion = None;
    }

    /// Manual drag input, radians.
    pub fn drag(&mut self, left: f32, up: f32) {
        self.orbit.rotate_left(left);
        self.orbit.rotate_up(up);
    }

    /// Limit yaw to the front half for half-sphere layouts.
    pub fn set_half_view(&mut self, half: bool) {
        self.orbit
            .set_azimuth_limit(if half { Some(FRAC_PI_2) } else { None });
    }

    /// Enter (`Some(distance)`) or leave flat-screen mode.
    pub fn set_flat(&mut self, distance: Option<f32>) {
        self.flat_distance = distance;
        if distance.is_some() {
            // look straight at the freshly built plane
            self.orbit.reset();
            self.camera = Quat::IDENTITY;
        }
    }

    pub fn offset(&self) -> Euler {
        self.state.user_offset
    }

    pub fn set_offset(&mut self, offset: Euler) {
        self.state.user_offset = offset.clamped();
    }

    pub fn reset_offset(&mut self) {
        self.state.user_offset = Euler::ZERO;
    }

    /// Make the current look direction the new forward.
    pub fn recenter(&mut self) {
        if self.sensor == SensorState::Active && self.state.last_sensor_angles.is_some() {
            self.state.user_offset.yaw = -self.orbit.yaw();
        } else {
            self.orbit.reset();
        }
    }

    /// Advance one tick and return the camera orientation.
    pub fn update(&mut self, dt: f32, sensor: Option<Quat>) -> Quat {
        if self.sensor == SensorState::Active {
            if let Some(q) = sensor {
                self.feed_sensor(q);
            }
        }

        self.orbit.update(dt);

        self.camera = if self.flat_distance.is_some() {
            self.orbit.orientation()
        } else {
            self.orbit.orientation() * self.state.user_offset.to_quat()
        };
        self.camera
    }

    fn feed_sensor(&mut self, q: Quat) {
        let angles = quat_to_angles(q);
        let last = self.state.last_sensor_angles.unwrap_or(angles);
        let gain = 1.0 + self.speed;

        self.orbit.rotate_left(wrap_angle(angles.yaw - last.yaw) * gain);
        self.orbit.rotate_up(wrap_angle(angles.roll - last.roll) * gain);

        self.state.sensor_quaternion = Some(q);
        self.state.last_sensor_angles = Some(angles);
    }

    /// Where the flat screen goes this tick, facing the viewer.
    pub fn flat_screen_transform(&self) -> Option<Transform> {
        let distance = self.flat_distance?;
        let offset = self.state.user_offset;
        Some(Transform {
            position: offset_position(offset, distance),
            rotation: offset.to_quat(),
            scale: Vec3::ONE,
        })
    }

    /// Drop all tracking state.
    pub fn reset(&mut self) {
        self.state = OrientationState::default();
        self.orbit.reset();
        self.orbit.set_azimuth_limit(None);
        self.flat_distance = None;
        self.camera = Quat::IDENTITY;
    }
}

impl Default for OrientationController {
    fn default() -> Self {
        Self::new(0.0, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn north_pole_branch() {
        let q = Quat::from_xyzw(0.5, 0.5, 0.5, 0.5);
        assert!(close(q.x * q.y + q.z * q.w, 0.5));
        let a = quat_to_angles(q);
        assert!(close(a.yaw, 2.0 * 0.5f32.atan2(0.5)));
        assert!(close(a.pitch, FRAC_PI_2));
        assert_eq!(a.roll, 0.0);
    }

    #[test]
    fn south_pole_branch() {
        let q = Quat::from_xyzw(-0.5, 0.5, -0.5, 0.5);
        assert!(close(q.x * q.y + q.z * q.w, -0.5));
        let a = quat_to_angles(q);
        assert!(close(a.yaw, FRAC_PI_2));
        assert!(close(a.pitch, -FRAC_PI_2));
        assert_eq!(a.roll, 0.0);
        assert!(a.yaw.is_finite());
    }

    #[test]
    fn pure_rotations_map_to_named_angles() {
        let a = quat_to_angles(Quat::from_rotation_y(0.7));
        assert!(close(a.yaw, 0.7) && close(a.roll, 0.0) && close(a.pitch, 0.0));

        let a = quat_to_angles(Quat::from_rotation_x(0.3));
        assert!(close(a.roll, 0.3) && close(a.yaw, 0.0));
    }

    #[test]
    fn reset_offset_gives_identity() {
        let mut c = OrientationController::default();
        c.set_offset(Euler::new(0.4, 1.0, -0.2));
        c.reset_offset();
        assert_eq!(c.offset(), Euler::ZERO);
        assert!(c.update(0.016, None).abs_diff_eq(Quat::IDENTITY, EPS));
    }

    #[test]
    fn offset_pitch_is_clamped() {
        let mut c = OrientationController::default();
        c.set_offset(Euler::new(3.0, 0.0, 0.0));
        assert_eq!(c.offset().pitch, FRAC_PI_2);
        c.set_offset(Euler::new(-3.0, 0.0, 0.0));
        assert_eq!(c.offset().pitch, -FRAC_PI_2);
    }

    #[test]
    fn offset_is_right_multiplied() {
        let mut c = OrientationController::default();
        c.drag(0.5, 0.0);
        c.set_offset(Euler::new(0.2, 0.0, 0.0));
        let cam = c.update(0.016, None);
        let expected = Quat::from_rotation_y(0.5) * Quat::from_rotation_x(0.2);
        assert!(cam.abs_diff_eq(expected, EPS));
    }

    #[test]
    fn sensor_deltas_coexist_with_drag() {
        let mut c = OrientationController::default();
        c.set_sensor_permission(true);

        // first sample only establishes the baseline
        c.update(0.016, Some(Quat::from_rotation_y(1.0)));
        assert!(close(c.orbit().yaw(), 0.0));

        c.update(0.016, Some(Quat::from_rotation_y(1.2)));
        assert!(close(c.orbit().yaw(), 0.2));

        // a drag on top of sensor tracking is kept
        c.drag(0.1, 0.0);
        c.update(0.016, Some(Quat::from_rotation_y(1.2)));
        assert!(close(c.orbit().yaw(), 0.3));
    }

    #[test]
    fn sensor_speed_scales_deltas() {
        let mut c = OrientationController::new(1.0, None);
        c.set_sensor_permission(true);
        c.update(0.016, Some(Quat::from_rotation_x(0.0)));
        c.update(0.016, Some(Quat::from_rotation_x(0.1)));
        assert!(close(c.orbit().pitch(), 0.2));
    }

    #[test]
    fn heading_delta_unwraps_across_pi() {
        let mut c = OrientationController::default();
        c.set_sensor_permission(true);
        c.update(0.016, Some(Quat::from_rotation_y(PI - 0.05)));
        c.update(0.016, Some(Quat::from_rotation_y(-PI + 0.05)));
        assert!(close(c.orbit().yaw(), 0.1));
    }

    #[test]
    fn denied_sensor_falls_back_to_drag() {
        let mut c = OrientationController::default();
        c.set_sensor_permission(false);
        assert_eq!(c.sensor_state(), SensorState::Denied);
        c.update(0.016, Some(Quat::from_rotation_y(1.0)));
        c.update(0.016, Some(Quat::from_rotation_y(2.0)));
        assert!(close(c.orbit().yaw(), 0.0));
        c.drag(0.25, 0.0);
        c.update(0.016, None);
        assert!(close(c.orbit().yaw(), 0.25));
    }

    #[test]
    fn half_view_clamps_azimuth() {
        let mut c = OrientationController::default();
        c.set_half_view(true);
        c.drag(2.5, 0.0);
        c.update(0.016, None);
        assert!(close(c.orbit().yaw(), FRAC_PI_2));
        c.set_half_view(false);
        c.drag(2.5, 0.0);
        c.update(0.016, None);
        assert!(close(c.orbit().yaw(), wrap_angle(FRAC_PI_2 + 2.5)));
    }

    #[test]
    fn recenter_with_sensor_cancels_heading() {
        let mut c = OrientationController::default();
        c.set_sensor_permission(true);
        c.update(0.016, Some(Quat::IDENTITY));
        c.update(0.016, Some(Quat::from_rotation_y(0.8)));
        c.recenter();
        assert!(close(c.offset().yaw, -0.8));
        assert!(c.update(0.016, Some(Quat::from_rotation_y(0.8))).abs_diff_eq(Quat::IDENTITY, EPS));
    }

    #[test]
    fn recenter_without_sensor_resets_orbit() {
        let mut c = OrientationController::default();
        c.drag(1.0, 0.4);
        c.update(0.016, None);
        c.recenter();
        assert_eq!((c.orbit().yaw(), c.orbit().pitch()), (0.0, 0.0));
        assert_eq!(c.offset(), Euler::ZERO);
    }

    #[test]
    fn damping_spreads_input_over_frames() {
        let mut orbit = OrbitControl::new(Some(0.5));
        orbit.rotate_left(1.0);
        orbit.update(1.0 / 60.0);
        assert!(close(orbit.yaw(), 0.5));
        orbit.update(1.0 / 60.0);
        assert!(close(orbit.yaw(), 0.75));
    }

    #[test]
    fn flat_offset_moves_screen_instead_of_camera() {
        let mut c = OrientationController::default();
        c.set_flat(Some(3.0));
        c.set_offset(Euler::new(0.0, FRAC_PI_2, 0.0));
        let cam = c.update(0.016, None);
        assert!(cam.abs_diff_eq(Quat::IDENTITY, EPS));

        let t = c.flat_screen_transform().expect("flat mode");
        assert!((t.position - Vec3::new(-3.0, 0.0, 0.0)).length() < EPS);
        // the screen's front (+Z) points back at the viewer
        let normal = t.rotation * Vec3::Z;
        assert!((normal + t.position.normalize()).length() < EPS);
    }

    #[test]
    fn offset_position_keeps_distance() {
        for (p, y) in [(0.3, 1.1), (-1.2, -2.0), (FRAC_PI_2, 0.0)] {
            let pos = offset_position(Euler::new(p, y, 0.0), 2.5);
            assert!(close(pos.length(), 2.5));
        }
    }
}
