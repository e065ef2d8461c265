use std::fmt;

/// Placeholder for a missing value, used only when a result is rendered as text
pub const UNKNOWN: &str = "XX";

/// Geolocation of a single IP address.
///
/// Fields the database has no data for are `None`. Latitude and longitude keep the shortest
/// decimal text that round-trips to the stored `f64`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoIpResult {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub geohash: Option<String>,
}

impl fmt::Display for GeoIpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(field: &Option<String>) -> &str {
            field.as_deref().unwrap_or(UNKNOWN)
        }
        write!(
            f,
            "country={} country_code={} region={} city={} latitude={} longitude={} geohash={}",
            show(&self.country),
            show(&self.country_code),
            show(&self.region),
            show(&self.city),
            show(&self.latitude),
            show(&self.longitude),
            show(&self.geohash),
        )
    }
}
