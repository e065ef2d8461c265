pub use backend::{CityBackend, CountryBackend};
pub use cached::CachedLookup;
pub use error::GeoError;
pub use max_mind_db::MaxMindReader;
pub use reader::{GeoReader, GeoRecord, Location, NAMES_LOCALE};
pub use result::{GeoIpResult, UNKNOWN};

mod backend;
mod cached;
mod error;
pub mod max_mind_db;
mod reader;
mod result;
#[cfg(test)]
pub(crate) mod stub;

use enum_dispatch::enum_dispatch;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::Path;

/// Database backend picked from the database file name
#[enum_dispatch]
pub enum Backend {
    City(CityBackend<MaxMindReader>),
    Country(CountryBackend<MaxMindReader>),
}

#[enum_dispatch(Backend)]
pub trait Lookup: Send + Sync {
    fn lookup(&self, address: IpAddr) -> Result<GeoIpResult, GeoError>;
}

impl Backend {
    /// "City" in the path selects the city backend, "Country" the country one
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, GeoError> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy();
        if path_str.contains("City") {
            Ok(CityBackend::new(MaxMindReader::from_file(path)?).into())
        } else if path_str.contains("Country") {
            Ok(CountryBackend::new(MaxMindReader::from_file(path)?).into())
        } else {
            Err(GeoError::UnknownDatabaseType(path.to_owned()))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::City(_) => "city",
            Self::Country(_) => "country",
        }
    }
}

/// Open the database at `path` and wrap it with a result cache of `cache_size` entries
pub fn new_lookup<P: AsRef<Path>>(
    path: P,
    cache_size: NonZeroUsize,
) -> Result<CachedLookup<Backend>, GeoError> {
    Ok(CachedLookup::new(Backend::from_path(path)?, cache_size))
}
