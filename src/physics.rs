// Kinematics helpers shared by particle creation, transport and collisions.
//
// Velocities in the store are normalized per axis (cell edges per specie
// timestep), so energy computations first rescale to SI through the
// specie's velocity scale.

use nalgebra::Vector3;
use rand::Rng;

use crate::constants::EV_IN_JOULE;

/// Uniformly distributed unit vector.
pub fn isotropic_direction<R: Rng>(rng: &mut R) -> Vector3<f64> {
    let mu: f64 = rng.gen_range(-1.0..1.0);
    let phi: f64 = rng.gen_range(0.0..2.0 * std::f64::consts::PI);
    let s = (1.0 - mu * mu).sqrt();
    Vector3::new(s * phi.cos(), s * phi.sin(), mu)
}

/// SI velocity [m/s] of a normalized velocity under `vel_scale` [m/s].
pub fn si_velocity(vel: Vector3<f64>, vel_scale: Vector3<f64>) -> Vector3<f64> {
    vel.component_mul(&vel_scale)
}

/// Kinetic energy [eV] of a normalized velocity.
pub fn kinetic_energy_ev(vel: Vector3<f64>, vel_scale: Vector3<f64>, mass_kg: f64) -> f64 {
    let v = si_velocity(vel, vel_scale);
    0.5 * mass_kg * v.norm_squared() / EV_IN_JOULE
}

/// Normalized velocity with isotropic direction and the given kinetic
/// energy [eV]. Inverse of [`kinetic_energy_ev`] up to direction.
pub fn velocity_from_energy<R: Rng>(
    rng: &mut R,
    energy_ev: f64,
    vel_scale: Vector3<f64>,
    mass_kg: f64,
) -> Vector3<f64> {
    let speed = (2.0 * energy_ev.max(0.0) * EV_IN_JOULE / mass_kg).sqrt();
    let dir = isotropic_direction(rng);
    Vector3::new(
        speed * dir.x / vel_scale.x,
        speed * dir.y / vel_scale.y,
        speed * dir.z / vel_scale.z,
    )
}

/// Redirect a normalized velocity isotropically, preserving its SI speed.
pub fn redirect_elastic<R: Rng>(
    rng: &mut R,
    vel: Vector3<f64>,
    vel_scale: Vector3<f64>,
) -> Vector3<f64> {
    let speed = si_velocity(vel, vel_scale).norm();
    let dir = isotropic_direction(rng);
    Vector3::new(
        speed * dir.x / vel_scale.x,
        speed * dir.y / vel_scale.y,
        speed * dir.z / vel_scale.z,
    )
}

/// Specular reflection about the plane with unit normal `n`.
pub fn reflect_velocity(vel: Vector3<f64>, n: Vector3<f64>) -> Vector3<f64> {
    vel - 2.0 * vel.dot(&n) * n
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_isotropic_direction_is_unit_and_unbiased() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut mean = Vector3::zeros();
        let n = 20000;
        for _ in 0..n {
            let d = isotropic_direction(&mut rng);
            assert!((d.norm() - 1.0).abs() < 1e-12);
            mean += d;
        }
        mean /= n as f64;
        assert!(mean.norm() < 0.02);
    }

    #[test]
    fn test_energy_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        let scale = Vector3::new(1.0e3, 1.0e3, 2.0e3);
        let mass = 6.64e-27;
        for &e in &[0.01, 1.0, 100.0] {
            let v = velocity_from_energy(&mut rng, e, scale, mass);
            let back = kinetic_energy_ev(v, scale, mass);
            assert!((back - e).abs() < 1e-9 * e);
        }
    }

    #[test]
    fn test_elastic_redirect_preserves_speed() {
        let mut rng = StdRng::seed_from_u64(3);
        let scale = Vector3::new(1.0e3, 2.0e3, 4.0e3);
        let v = Vector3::new(0.1, -0.4, 0.2);
        let speed = si_velocity(v, scale).norm();
        for _ in 0..100 {
            let w = redirect_elastic(&mut rng, v, scale);
            assert!((si_velocity(w, scale).norm() - speed).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reflect_velocity_negates_normal_component() {
        let n = Vector3::new(1.0, 0.0, 0.0);
        let v = Vector3::new(0.3, -0.2, 0.5);
        let r = reflect_velocity(v, n);
        assert_eq!(r, Vector3::new(-0.3, -0.2, 0.5));
        // Reflection is an involution.
        assert_eq!(reflect_velocity(r, n), v);
    }
}
