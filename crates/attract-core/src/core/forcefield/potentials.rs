pub const COULOMB_CONSTANT: f64 = 332.0637; // In kcal·Å/(mol·e²)

/// Squared distances below this are evaluated at this value with a zero derivative.
pub const MIN_SQUARED_DISTANCE: f64 = 1e-3;

/// ATTRACT 8-6 soft van der Waals potential, `rc / r^8 - ac / r^6`.
///
/// Takes the squared distance and returns `(energy, dE/dr²)`.
#[inline]
pub fn attract_8_6(r2: f64, repulsive: f64, attractive: f64) -> (f64, f64) {
    let (r2, clamped) = clamp_r2(r2);
    let rr2 = 1.0 / r2;
    let rr6 = rr2 * rr2 * rr2;
    let rr8 = rr6 * rr2;
    let energy = repulsive * rr8 - attractive * rr6;
    if clamped {
        return (energy, 0.0);
    }
    let derivative = -4.0 * repulsive * rr8 * rr2 + 3.0 * attractive * rr8;
    (energy, derivative)
}

/// Coulomb energy with a distance-dependent dielectric `eps(r) = scale * r`.
///
/// Takes the squared distance and returns `(energy, dE/dr²)`.
#[inline]
pub fn coulomb_distance_dependent(r2: f64, q1: f64, q2: f64, scale: f64) -> (f64, f64) {
    let (r2, clamped) = clamp_r2(r2);
    let energy = COULOMB_CONSTANT * q1 * q2 / (scale * r2);
    if clamped {
        return (energy, 0.0);
    }
    (energy, -energy / r2)
}

/// Coulomb energy with a constant dielectric.
///
/// Takes the squared distance and returns `(energy, dE/dr²)`.
#[inline]
pub fn coulomb_constant_dielectric(r2: f64, q1: f64, q2: f64, dielectric: f64) -> (f64, f64) {
    let (r2, clamped) = clamp_r2(r2);
    let energy = COULOMB_CONSTANT * q1 * q2 / (dielectric * r2.sqrt());
    if clamped {
        return (energy, 0.0);
    }
    (energy, -0.5 * energy / r2)
}

/// CHARMM-style switching function between `r_on` and `r_off`, in squared distances.
///
/// Returns `(S, dS/dr²)`: `S = 1` below `r_on`, `S = 0` at and beyond `r_off`.
#[inline]
pub fn switching(r2: f64, r_on2: f64, r_off2: f64) -> (f64, f64) {
    if r2 <= r_on2 {
        return (1.0, 0.0);
    }
    if r2 >= r_off2 {
        return (0.0, 0.0);
    }
    let a = r_off2 - r2;
    let b = r_off2 + 2.0 * r2 - 3.0 * r_on2;
    let denominator = (r_off2 - r_on2).powi(3);
    (a * a * b / denominator, 6.0 * a * (r_on2 - r2) / denominator)
}

#[inline]
fn clamp_r2(r2: f64) -> (f64, bool) {
    if r2 < MIN_SQUARED_DISTANCE {
        (MIN_SQUARED_DISTANCE, true)
    } else {
        (r2, false)
    }
}
