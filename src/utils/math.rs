use glam::{Quat, Vec3};
use rapier3d::na;
use rapier3d::prelude::{Isometry, Real};

/// Convert a glam vector into a nalgebra vector for the physics boundary
pub fn to_na_vector(v: Vec3) -> na::Vector3<Real> {
    na::Vector3::new(v.x, v.y, v.z)
}

/// Convert a glam vector into a nalgebra point
pub fn to_na_point(v: Vec3) -> na::Point3<Real> {
    na::Point3::new(v.x, v.y, v.z)
}

/// Convert a glam quaternion into a nalgebra unit quaternion
pub fn to_na_quat(q: Quat) -> na::UnitQuaternion<Real> {
    na::UnitQuaternion::from_quaternion(na::Quaternion::new(q.w, q.x, q.y, q.z))
}

/// Build an isometry from a glam position and rotation
pub fn to_na_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    Isometry::from_parts(na::Translation3::from(to_na_vector(position)), to_na_quat(rotation))
}

pub fn from_na_vector(v: &na::Vector3<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub fn from_na_quat(q: &na::UnitQuaternion<Real>) -> Quat {
    // nalgebra stores the scalar part last in coords
    Quat::from_xyzw(q.coords.x, q.coords.y, q.coords.z, q.coords.w)
}

/// Move `current` a fraction of the way toward `target`.
///
/// `t` is usually `rate * delta`; it is clamped so a long frame cannot
/// overshoot the target.
pub fn exp_approach(current: f32, target: f32, t: f32) -> f32 {
    current + (target - current) * t.clamp(0.0, 1.0)
}
