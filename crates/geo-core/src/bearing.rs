use crate::Coordinate;

/// Initial compass heading from `from` to `to`, in degrees clockwise from north.
///
/// Forward azimuth on a sphere. The result is always in `[0, 360)`; identical
/// points fall out of `atan2(0, 0)` as `0`.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_lambda = (to.longitude - from.longitude).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    let theta = y.atan2(x);

    (theta.to_degrees() + 360.0) % 360.0
}
