use glam::{Quat, Vec3};
use gizmo_scene::Ray;

/// Largest object dimension over distance below which an XZ drag stops at the horizon.
pub const MIN_ELEVATION: f32 = 0.02;
/// Radians.
pub const MIN_ANGULAR_SIZE: f32 = 0.01;
/// Half extent of the placeable world, in meters.
pub const WORLD_HALF_EXTENT: f32 = 16384.0;

const PARALLEL_EPSILON: f32 = 1.0e-6;

/// Intersection of the ray's line with a plane. Points behind the ray origin are
/// still returned; only a parallel ray yields `None`.
pub fn ray_plane_intersection(ray: &Ray, plane_point: Vec3, plane_normal: Vec3) -> Option<Vec3> {
    let denom = plane_normal.dot(ray.direction);
    if denom.abs() <= PARALLEL_EPSILON {
        return None;
    }
    let t = (plane_point - ray.origin).dot(plane_normal) / denom;
    Some(ray.origin + ray.direction * t)
}

pub fn ray_plane_intersection_forward(
    ray: &Ray,
    plane_point: Vec3,
    plane_normal: Vec3,
) -> Option<Vec3> {
    let denom = plane_normal.dot(ray.direction);
    if denom.abs() <= PARALLEL_EPSILON {
        return None;
    }
    let t = (plane_point - ray.origin).dot(plane_normal) / denom;
    if t < 0.0 {
        return None;
    }
    Some(ray.origin + ray.direction * t)
}

pub fn point_in_oriented_box(point: Vec3, position: Vec3, rotation: Quat, dimensions: Vec3) -> bool {
    let local = rotation.inverse() * (point - position);
    let half = dimensions.abs() * 0.5;
    local.abs().cmple(half).all()
}

/// Signed angle in degrees from `from` to `to`, positive counter-clockwise around `normal`.
pub fn oriented_angle(from: Vec3, to: Vec3, normal: Vec3) -> f32 {
    let from = from.normalize_or_zero();
    let to = to.normalize_or_zero();
    let cross = from.cross(to);
    cross.dot(normal.normalize_or_zero()).atan2(from.dot(to)).to_degrees()
}

/// True when the new pick direction has crossed to the other side of the plane.
pub fn use_previous_pick_ray(direction: Vec3, previous_direction: Vec3, normal: Vec3) -> bool {
    let now = direction.dot(normal);
    let before = previous_direction.dot(normal);
    (now > 0.0 && before < 0.0) || (now < 0.0 && before > 0.0)
}

/// Height of `origin` over `intersection` divided by their distance.
pub fn elevation(origin: Vec3, intersection: Vec3) -> f32 {
    let distance = origin.distance(intersection);
    if distance <= f32::EPSILON {
        return 0.0;
    }
    (origin.y - intersection.y) / distance
}

/// Wraps to the half-open range (-180, 180].
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

pub fn world_bounds_contain(position: Vec3) -> bool {
    position.is_finite() && position.abs().cmple(Vec3::splat(WORLD_HALF_EXTENT)).all()
}

/// Rounds toward negative infinity in multiples of `step`.
pub fn snap_angle_down(angle: f32, step: f32) -> f32 {
    if step <= 0.0 {
        return angle;
    }
    (angle / step).floor() * step
}

/// Unit vector of the largest-magnitude component of `v`, keeping its sign.
pub fn dominant_axis(v: Vec3) -> Vec3 {
    let abs = v.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        Vec3::new(v.x.signum(), 0.0, 0.0)
    } else if abs.y >= abs.z {
        Vec3::new(0.0, v.y.signum(), 0.0)
    } else {
        Vec3::new(0.0, 0.0, v.z.signum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_hit_behind_origin_is_kept() {
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let hit = ray_plane_intersection(&ray, Vec3::ZERO, Vec3::Y);
        assert_eq!(hit, Some(Vec3::ZERO));
        assert!(ray_plane_intersection_forward(&ray, Vec3::ZERO, Vec3::Y).is_none());
    }

    #[test]
    fn parallel_ray_misses_plane() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(ray_plane_intersection(&ray, Vec3::Y, Vec3::Y).is_none());
    }

    #[test]
    fn oriented_angle_is_signed() {
        let a = oriented_angle(Vec3::X, Vec3::Z, Vec3::Y);
        assert!((a + 90.0).abs() < 1.0e-4);
        let b = oriented_angle(Vec3::Z, Vec3::X, Vec3::Y);
        assert!((b - 90.0).abs() < 1.0e-4);
    }

    #[test]
    fn pick_ray_flip_detection() {
        assert!(use_previous_pick_ray(Vec3::Z, Vec3::NEG_Z, Vec3::Z));
        assert!(!use_previous_pick_ray(Vec3::Z, Vec3::new(0.1, 0.0, 1.0), Vec3::Z));
        assert!(!use_previous_pick_ray(Vec3::X, Vec3::NEG_Z, Vec3::Z));
    }

    #[test]
    fn degrees_wrap_into_half_open_range() {
        assert_eq!(normalize_degrees(180.0), 180.0);
        assert_eq!(normalize_degrees(-180.0), 180.0);
        assert_eq!(normalize_degrees(270.0), -90.0);
        assert_eq!(normalize_degrees(-30.0), -30.0);
    }

    #[test]
    fn oriented_box_contains_rotated_point() {
        let rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let dims = Vec3::new(4.0, 1.0, 1.0);
        assert!(point_in_oriented_box(Vec3::new(0.0, 1.5, 0.0), Vec3::ZERO, rotation, dims));
        assert!(!point_in_oriented_box(Vec3::new(1.5, 0.0, 0.0), Vec3::ZERO, rotation, dims));
    }

    #[test]
    fn snap_down_floors_negative_angles() {
        assert_eq!(snap_angle_down(100.0, 22.5), 90.0);
        assert_eq!(snap_angle_down(-10.0, 22.5), -22.5);
    }

    #[test]
    fn world_bounds() {
        assert!(world_bounds_contain(Vec3::new(16384.0, 0.0, -16000.0)));
        assert!(!world_bounds_contain(Vec3::new(0.0, 20000.0, 0.0)));
        assert!(!world_bounds_contain(Vec3::new(f32::NAN, 0.0, 0.0)));
    }
}
