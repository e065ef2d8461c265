use crate::geo::{GeoError, GeoReader, GeoRecord, Location};

use maxminddb::geoip2;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

fn owned_names(names: Option<BTreeMap<&str, &str>>) -> BTreeMap<String, String> {
    names
        .into_iter()
        .flatten()
        .map(|(locale, name)| (locale.to_owned(), name.to_owned()))
        .collect()
}

fn owned_country(country: Option<geoip2::country::Country>) -> (Option<String>, BTreeMap<String, String>) {
    match country {
        Some(country) => (
            country.iso_code.map(str::to_owned),
            owned_names(country.names),
        ),
        None => (None, BTreeMap::new()),
    }
}

/// MaxMind GeoIP2 / GeoLite2 database loaded into memory
pub struct MaxMindReader {
    maxminddb_reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindReader {
    pub fn from_file<P: AsRef<Path>>(filepath: P) -> Result<Self, GeoError> {
        Ok(Self {
            maxminddb_reader: maxminddb::Reader::open_readfile(filepath)?,
        })
    }
}

fn city_record(city: geoip2::City) -> GeoRecord {
    let (country_iso_code, country_names) = owned_country(city.country);
    let location = city.location.and_then(|location| {
        Some(Location {
            latitude: location.latitude?,
            longitude: location.longitude?,
        })
    });
    GeoRecord {
        country_iso_code,
        country_names,
        city_names: owned_names(city.city.and_then(|city| city.names)),
        subdivisions: city
            .subdivisions
            .into_iter()
            .flatten()
            .map(|subdivision| subdivision.iso_code.map(str::to_owned))
            .collect(),
        location,
    }
}

fn country_record(country: geoip2::Country) -> GeoRecord {
    let (country_iso_code, country_names) = owned_country(country.country);
    GeoRecord {
        country_iso_code,
        country_names,
        ..Default::default()
    }
}

impl GeoReader for MaxMindReader {
    fn lookup_city(&self, address: IpAddr) -> Result<GeoRecord, GeoError> {
        let city: geoip2::City = self.maxminddb_reader.lookup(address)?;
        Ok(city_record(city))
    }

    fn lookup_country(&self, address: IpAddr) -> Result<GeoRecord, GeoError> {
        let country: geoip2::Country = self.maxminddb_reader.lookup(address)?;
        Ok(country_record(country))
    }
}
