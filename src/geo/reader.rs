use crate::geo::GeoError;

use std::collections::BTreeMap;
use std::net::IpAddr;

/// Locale used for country and city names
pub const NAMES_LOCALE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Owned database record, country lookups leave the city-level fields empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRecord {
    pub country_iso_code: Option<String>,
    pub country_names: BTreeMap<String, String>,
    pub city_names: BTreeMap<String, String>,
    /// ISO codes of subdivisions, largest first
    pub subdivisions: Vec<Option<String>>,
    pub location: Option<Location>,
}

/// Geolocation database able to resolve a single IP address
pub trait GeoReader: Send + Sync {
    fn lookup_city(&self, address: IpAddr) -> Result<GeoRecord, GeoError>;
    fn lookup_country(&self, address: IpAddr) -> Result<GeoRecord, GeoError>;
}
