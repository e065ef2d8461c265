//! In-memory stand-in for a GeoLite2 database, counting how often it is queried.

use crate::geo::{GeoError, GeoReader, GeoRecord, Location};

use maxminddb::MaxMindDBError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MUNICH_IP: &str = "188.193.88.199";
pub const NO_CITY_IP: &str = "20.1.184.61";
pub const UNKNOWN_IP: &str = "127.0.0.1";

fn names(name: &str) -> std::collections::BTreeMap<String, String> {
    [("en".to_owned(), name.to_owned())].into()
}

pub fn munich() -> GeoRecord {
    GeoRecord {
        country_iso_code: Some("DE".to_owned()),
        country_names: names("Germany"),
        city_names: names("Munich"),
        subdivisions: vec![Some("BY".to_owned())],
        location: Some(Location {
            latitude: 48.1663,
            longitude: 11.5683,
        }),
    }
}

pub fn united_states() -> GeoRecord {
    GeoRecord {
        country_iso_code: Some("US".to_owned()),
        country_names: names("United States"),
        location: Some(Location {
            latitude: 37.751,
            longitude: -97.822,
        }),
        ..Default::default()
    }
}

#[derive(Clone)]
pub struct StubReader {
    records: HashMap<IpAddr, GeoRecord>,
    calls: Arc<AtomicUsize>,
}

impl StubReader {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
        .with_record(MUNICH_IP, munich())
        .with_record(NO_CITY_IP, united_states())
    }

    pub fn with_record(mut self, ip: &str, record: GeoRecord) -> Self {
        self.records.insert(ip.parse().unwrap(), record);
        self
    }

    /// Shared counter, stays valid after the reader is moved into a backend
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, address: IpAddr) -> Result<GeoRecord, GeoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.records.get(&address).cloned().ok_or_else(|| {
            MaxMindDBError::AddressNotFoundError("Address not found in database".to_owned()).into()
        })
    }
}

impl GeoReader for StubReader {
    fn lookup_city(&self, address: IpAddr) -> Result<GeoRecord, GeoError> {
        self.record(address)
    }

    fn lookup_country(&self, address: IpAddr) -> Result<GeoRecord, GeoError> {
        let record = self.record(address)?;
        Ok(GeoRecord {
            country_iso_code: record.country_iso_code,
            country_names: record.country_names,
            ..Default::default()
        })
    }
}
