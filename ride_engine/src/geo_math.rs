use ride_tracker_lib::coordinates::Coordinates;

pub const EARTH_RADIUS_KM: f64 = 6371.; // Mean radius

/// Great-circle distance in kilometers.
pub fn haversine_km(p1: Coordinates, p2: Coordinates) -> f64 {
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    let c = 2. * f64::atan2(a.sqrt(), (1. - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn haversine_m(p1: Coordinates, p2: Coordinates) -> f64 {
    haversine_km(p1, p2) * 1000.
}

/// Initial bearing from `from` to `to` in degrees, 0 = north, 90 = east, in [0, 360).
pub fn initial_bearing(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    let bearing = y.atan2(x).to_degrees().rem_euclid(360.);

    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if bearing >= 360. { 0. } else { bearing }
}
