use crate::config::GeoIpConfig;
use crate::exclude::ExcludedNetworks;
use crate::geo::{new_lookup, Backend, CachedLookup, GeoError, GeoIpResult, Lookup};
use crate::header_tools::client_ip_candidate;

use hyper::header::{HeaderMap, HeaderValue};
use std::net::IpAddr;

pub const COUNTRY_HEADER: &str = "GeoIP-Country";
pub const COUNTRY_CODE_HEADER: &str = "GeoIP-Country-Code";
pub const REGION_HEADER: &str = "GeoIP-Region";
pub const CITY_HEADER: &str = "GeoIP-City";
pub const LATITUDE_HEADER: &str = "GeoIP-Latitude";
pub const LONGITUDE_HEADER: &str = "GeoIP-Longitude";
pub const GEOHASH_HEADER: &str = "GeoIP-Geohash";
pub const REAL_IP_HEADER: &str = "X-Real-Ip";

pub const GEOIP_HEADERS: [&str; 7] = [
    COUNTRY_HEADER,
    COUNTRY_CODE_HEADER,
    REGION_HEADER,
    CITY_HEADER,
    LATITUDE_HEADER,
    LONGITUDE_HEADER,
    GEOHASH_HEADER,
];

/// What happened to a request, every variant but `Enriched` leaves geo headers untouched
#[derive(Debug)]
pub enum Outcome {
    /// No database is loaded
    Disabled,
    /// Client address is not an IP address
    Unparseable,
    Excluded(IpAddr),
    LookupFailed(IpAddr, GeoError),
    Enriched(IpAddr, GeoIpResult),
}

/// Adds geolocation headers to requests based on the client IP address.
///
/// Without a lookup the enricher is a pass-through. Nothing in here fails a request: bad client
/// addresses and database misses only mean the request is forwarded without geo headers.
pub struct Enricher<L = CachedLookup<Backend>> {
    name: String,
    lookup: Option<L>,
    excluded: ExcludedNetworks,
    set_real_ip: bool,
    ip_headers: Vec<String>,
    ip_headers_recursive: bool,
}

impl Enricher {
    /// Load the database from `config.db_path`, degrading to a pass-through if that is impossible
    pub fn from_config(config: &GeoIpConfig) -> Self {
        let name = &config.name;
        let path = &config.db_path;
        log::debug!("[{name}] setting up: {config:?}");

        let lookup = if !path.exists() {
            log::warn!("[{name}] database {path:?} not found, requests are passed through unchanged");
            None
        } else {
            match new_lookup(path, config.cache_size) {
                Ok(lookup) => {
                    log::info!(
                        "[{name}] {} database {path:?} loaded, caching up to {} results",
                        lookup.inner().kind(),
                        config.cache_size,
                    );
                    Some(lookup)
                }
                Err(e) => {
                    log::error!("[{name}] database {path:?} is not usable, requests are passed through unchanged: {e}");
                    None
                }
            }
        };
        Self::new(lookup, config)
    }
}

impl<L: Lookup> Enricher<L> {
    pub fn new(lookup: Option<L>, config: &GeoIpConfig) -> Self {
        Self {
            name: config.name.clone(),
            lookup,
            excluded: ExcludedNetworks::parse(&config.exclude_ips, &config.name),
            set_real_ip: config.set_real_ip,
            ip_headers: config.ip_headers.clone(),
            ip_headers_recursive: config.ip_headers_recursive,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lookup.is_some()
    }

    /// Resolve the client of a request and set geo headers for every known field.
    ///
    /// `remote_addr` is the transport address, used when no forwarded-for header is present.
    pub fn process(&self, headers: &mut HeaderMap, remote_addr: &str) -> Outcome {
        let name = &self.name;
        let Some(lookup) = &self.lookup else {
            return Outcome::Disabled;
        };

        let candidate = client_ip_candidate(
            headers,
            &self.ip_headers,
            self.ip_headers_recursive,
            remote_addr,
        );
        let ip = match candidate.parse::<IpAddr>() {
            Ok(ip) => ip.to_canonical(),
            Err(e) => {
                log::debug!("[{name}] client IP {candidate:?} is not valid: {e}");
                return Outcome::Unparseable;
            }
        };

        if self.excluded.contains(ip) {
            log::debug!("[{name}] IP excluded: ip={ip}");
            return Outcome::Excluded(ip);
        }

        if self.set_real_ip {
            set_header(headers, REAL_IP_HEADER, &ip.to_string(), name);
        }

        match lookup.lookup(ip) {
            Ok(result) => {
                log::debug!("[{name}] lookup result: ip={ip}, {result}");
                set_result_headers(headers, &result, name);
                Outcome::Enriched(ip, result)
            }
            Err(e) => {
                log::debug!("[{name}] lookup error: ip={ip}, err={e}");
                Outcome::LookupFailed(ip, e)
            }
        }
    }
}

fn set_result_headers(headers: &mut HeaderMap, result: &GeoIpResult, name: &str) {
    let fields = [
        &result.country,
        &result.country_code,
        &result.region,
        &result.city,
        &result.latitude,
        &result.longitude,
        &result.geohash,
    ];
    for (header, field) in GEOIP_HEADERS.into_iter().zip(fields) {
        if let Some(value) = field {
            set_header(headers, header, value, name);
        }
    }
}

fn set_header(headers: &mut HeaderMap, header: &'static str, value: &str, name: &str) {
    // raw bytes so that non-ASCII names like "Zürich" survive
    match HeaderValue::from_bytes(value.as_bytes()) {
        Ok(value) => {
            headers.insert(header, value);
        }
        Err(e) => log::warn!("[{name}] {value:?} cannot be used as {header} header: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::stub::{StubReader, MUNICH_IP, NO_CITY_IP, UNKNOWN_IP};
    use crate::geo::{CityBackend, CountryBackend, GeoRecord};
    use std::num::NonZeroUsize;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type StubCityLookup = CachedLookup<CityBackend<StubReader>>;

    fn city_enricher(config: &GeoIpConfig) -> (Enricher<StubCityLookup>, Arc<AtomicUsize>) {
        city_enricher_with(StubReader::new(), config)
    }

    fn city_enricher_with(
        reader: StubReader,
        config: &GeoIpConfig,
    ) -> (Enricher<StubCityLookup>, Arc<AtomicUsize>) {
        let calls = reader.counter();
        let lookup = CachedLookup::new(CityBackend::new(reader), NonZeroUsize::new(16).unwrap());
        (Enricher::new(Some(lookup), config), calls)
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
        headers
            .get(name)
            .map(|value| value.to_str().unwrap())
            .unwrap_or("")
    }

    fn assert_no_geo_headers(headers: &HeaderMap) {
        for name in GEOIP_HEADERS {
            assert_eq!(header(headers, name), "", "{name} must not be set");
        }
    }

    #[test]
    fn missing_database_passes_through() {
        let config = GeoIpConfig {
            db_path: PathBuf::from("./non-existing/GeoLite2-City.mmdb"),
            ..Default::default()
        };
        let enricher = Enricher::from_config(&config);
        assert!(!enricher.is_enabled());

        let mut headers = HeaderMap::new();
        let outcome = enricher.process(&mut headers, "1.2.3.4");
        assert!(matches!(outcome, Outcome::Disabled));
        assert!(headers.is_empty());
    }

    #[test]
    fn unrecognised_database_passes_through() {
        // exists, but is neither a city nor a country database
        let config = GeoIpConfig {
            db_path: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"),
            ..Default::default()
        };
        let enricher = Enricher::from_config(&config);
        assert!(!enricher.is_enabled());
        let mut headers = HeaderMap::new();
        assert!(matches!(
            enricher.process(&mut headers, MUNICH_IP),
            Outcome::Disabled
        ));
        assert!(headers.is_empty());
    }

    #[test]
    fn headers_from_remote_addr() {
        let (enricher, _) = city_enricher(&GeoIpConfig::default());

        let mut headers = HeaderMap::new();
        let outcome = enricher.process(&mut headers, &format!("{MUNICH_IP}:9999"));
        assert!(matches!(outcome, Outcome::Enriched(ip, _) if ip.to_string() == MUNICH_IP));
        assert_eq!(header(&headers, COUNTRY_HEADER), "Germany");
        assert_eq!(header(&headers, COUNTRY_CODE_HEADER), "DE");
        assert_eq!(header(&headers, REGION_HEADER), "BY");
        assert_eq!(header(&headers, CITY_HEADER), "Munich");
        assert_eq!(header(&headers, LATITUDE_HEADER), "48.1663");
        assert_eq!(header(&headers, LONGITUDE_HEADER), "11.5683");
        assert_eq!(header(&headers, GEOHASH_HEADER), "u284p0rv0cje");
        assert_eq!(header(&headers, REAL_IP_HEADER), "");

        let mut headers = HeaderMap::new();
        enricher.process(&mut headers, &format!("{NO_CITY_IP}:9999"));
        assert_eq!(header(&headers, COUNTRY_HEADER), "United States");
        assert_eq!(header(&headers, COUNTRY_CODE_HEADER), "US");
        assert_eq!(header(&headers, REGION_HEADER), "");
        assert_eq!(header(&headers, CITY_HEADER), "");
        assert_eq!(header(&headers, LATITUDE_HEADER), "37.751");
        assert_eq!(header(&headers, LONGITUDE_HEADER), "-97.822");
        assert!(headers.contains_key(GEOHASH_HEADER));
    }

    #[test]
    fn unparseable_remote_addr() {
        let (enricher, calls) = city_enricher(&GeoIpConfig::default());
        for remote_addr in ["qwerty:9999", "", "[::1]", "1.2.3.4.5:80"] {
            let mut headers = HeaderMap::new();
            let outcome = enricher.process(&mut headers, remote_addr);
            assert!(matches!(outcome, Outcome::Unparseable), "{remote_addr}");
            assert!(headers.is_empty());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn forwarded_for_takes_precedence() {
        let (enricher, _) = city_enricher(&GeoIpConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            format!(" {MUNICH_IP}, {NO_CITY_IP}").parse().unwrap(),
        );
        enricher.process(&mut headers, &format!("{NO_CITY_IP}:9999"));
        assert_eq!(header(&headers, CITY_HEADER), "Munich");
    }

    #[test]
    fn unparseable_forwarded_for_does_not_fall_back() {
        let (enricher, _) = city_enricher(&GeoIpConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "unknown".parse().unwrap());
        let outcome = enricher.process(&mut headers, &format!("{MUNICH_IP}:9999"));
        assert!(matches!(outcome, Outcome::Unparseable));
        assert_no_geo_headers(&headers);
    }

    #[test]
    fn ipv4_mapped_address_is_canonicalised() {
        let (enricher, _) = city_enricher(&GeoIpConfig::default());
        let mut headers = HeaderMap::new();
        let outcome = enricher.process(&mut headers, &format!("[::ffff:{MUNICH_IP}]:443"));
        assert!(matches!(outcome, Outcome::Enriched(IpAddr::V4(_), _)));
        assert_eq!(header(&headers, COUNTRY_CODE_HEADER), "DE");
    }

    #[test]
    fn excluded_ips_are_ignored() {
        let config = GeoIpConfig {
            exclude_ips: vec![MUNICH_IP.to_owned()],
            set_real_ip: true,
            ..Default::default()
        };
        let (enricher, calls) = city_enricher(&config);
        let mut headers = HeaderMap::new();
        let outcome = enricher.process(&mut headers, &format!("{MUNICH_IP}:9999"));
        assert!(matches!(outcome, Outcome::Excluded(_)));
        assert!(headers.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn excluded_networks() {
        let config = GeoIpConfig {
            exclude_ips: vec!["188.193.0.0/16".to_owned()],
            ..Default::default()
        };
        let (enricher, _) = city_enricher(&config);
        let mut headers = HeaderMap::new();
        enricher.process(&mut headers, MUNICH_IP);
        assert_no_geo_headers(&headers);

        let mut headers = HeaderMap::new();
        enricher.process(&mut headers, NO_CITY_IP);
        assert_eq!(header(&headers, COUNTRY_CODE_HEADER), "US");
    }

    #[test]
    fn invalid_exclude_entry_is_skipped() {
        let config = GeoIpConfig {
            exclude_ips: vec!["invalid".to_owned()],
            ..Default::default()
        };
        let (enricher, _) = city_enricher(&config);
        let mut headers = HeaderMap::new();
        enricher.process(&mut headers, &format!("{MUNICH_IP}:9999"));
        assert_eq!(header(&headers, COUNTRY_HEADER), "Germany");
        assert_eq!(header(&headers, CITY_HEADER), "Munich");
    }

    #[test]
    fn real_ip_is_set_before_lookup() {
        let config = GeoIpConfig {
            set_real_ip: true,
            ..Default::default()
        };
        let (enricher, _) = city_enricher(&config);

        let mut headers = HeaderMap::new();
        headers.insert(REAL_IP_HEADER, "10.0.0.1".parse().unwrap());
        headers.insert("X-Forwarded-For", MUNICH_IP.parse().unwrap());
        enricher.process(&mut headers, "10.0.0.1:1234");
        assert_eq!(header(&headers, REAL_IP_HEADER), MUNICH_IP);

        // database miss still overwrites the real IP
        let mut headers = HeaderMap::new();
        let outcome = enricher.process(&mut headers, &format!("{UNKNOWN_IP}:80"));
        assert!(matches!(outcome, Outcome::LookupFailed(_, _)));
        assert_eq!(header(&headers, REAL_IP_HEADER), UNKNOWN_IP);
        assert_no_geo_headers(&headers);
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let (enricher, calls) = city_enricher(&GeoIpConfig::default());
        for _ in 0..3 {
            let mut headers = HeaderMap::new();
            enricher.process(&mut headers, &format!("{MUNICH_IP}:9999"));
            assert_eq!(header(&headers, CITY_HEADER), "Munich");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn country_database_sets_country_only() {
        let reader = StubReader::new();
        let lookup = CachedLookup::new(CountryBackend::new(reader), NonZeroUsize::new(4).unwrap());
        let enricher = Enricher::new(Some(lookup), &GeoIpConfig::default());

        let mut headers = HeaderMap::new();
        enricher.process(&mut headers, &format!("{MUNICH_IP}:9999"));
        assert_eq!(header(&headers, COUNTRY_HEADER), "Germany");
        assert_eq!(header(&headers, COUNTRY_CODE_HEADER), "DE");
        for name in [REGION_HEADER, CITY_HEADER, LATITUDE_HEADER, LONGITUDE_HEADER, GEOHASH_HEADER] {
            assert_eq!(header(&headers, name), "", "{name}");
        }
    }

    #[test]
    fn non_ascii_and_invalid_values() {
        let reader = StubReader::new().with_record(
            "192.0.2.10",
            GeoRecord {
                country_iso_code: Some("CH".to_owned()),
                country_names: [("en".to_owned(), "Switzerland".to_owned())].into(),
                city_names: [("en".to_owned(), "Zürich".to_owned())].into(),
                subdivisions: vec![Some("ZH\n".to_owned())],
                ..Default::default()
            },
        );
        let (enricher, _) = city_enricher_with(reader, &GeoIpConfig::default());
        let mut headers = HeaderMap::new();
        enricher.process(&mut headers, "192.0.2.10");
        assert_eq!(headers[CITY_HEADER].as_bytes(), "Zürich".as_bytes());
        assert_eq!(header(&headers, COUNTRY_CODE_HEADER), "CH");
        assert!(!headers.contains_key(REGION_HEADER));
    }
}
