use crate::geo::{GeoError, GeoIpResult, GeoReader, GeoRecord, Lookup, NAMES_LOCALE};
use crate::geohash;

use std::net::IpAddr;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn country_fields(record: &mut GeoRecord) -> (Option<String>, Option<String>) {
    (
        non_empty(record.country_names.remove(NAMES_LOCALE)),
        non_empty(record.country_iso_code.take()),
    )
}

/// Lookup against a city-level database: country, first subdivision, city and coordinates
pub struct CityBackend<R> {
    reader: R,
}

impl<R: GeoReader> CityBackend<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: GeoReader> Lookup for CityBackend<R> {
    fn lookup(&self, address: IpAddr) -> Result<GeoIpResult, GeoError> {
        let mut record = self.reader.lookup_city(address)?;
        let (country, country_code) = country_fields(&mut record);
        let region = non_empty(record.subdivisions.into_iter().next().flatten());
        let city = non_empty(record.city_names.remove(NAMES_LOCALE));
        let (latitude, longitude, geohash) = match record.location {
            Some(location) => (
                Some(location.latitude.to_string()),
                Some(location.longitude.to_string()),
                Some(geohash::encode(location.latitude, location.longitude)),
            ),
            None => (None, None, None),
        };
        Ok(GeoIpResult {
            country,
            country_code,
            region,
            city,
            latitude,
            longitude,
            geohash,
        })
    }
}

/// Lookup against a country-level database, only country fields are ever known
pub struct CountryBackend<R> {
    reader: R,
}

impl<R: GeoReader> CountryBackend<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: GeoReader> Lookup for CountryBackend<R> {
    fn lookup(&self, address: IpAddr) -> Result<GeoIpResult, GeoError> {
        let mut record = self.reader.lookup_country(address)?;
        let (country, country_code) = country_fields(&mut record);
        Ok(GeoIpResult {
            country,
            country_code,
            ..Default::default()
        })
    }
}
