use ipnet::IpNet;
use smallvec::SmallVec;
use std::net::IpAddr;

fn host_prefix_len(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Networks whose clients are never looked up, checked in configuration order
#[derive(Debug, Clone, Default)]
pub struct ExcludedNetworks(SmallVec<[IpNet; 4]>);

impl ExcludedNetworks {
    /// Parse IP addresses and CIDR blocks, a bare address becomes a /32 or /128 network.
    ///
    /// Entries that are neither are skipped with a warning.
    pub fn parse<S: AsRef<str>>(entries: &[S], name: &str) -> Self {
        Self(
            entries
                .iter()
                .filter_map(|entry| {
                    let entry = entry.as_ref().trim();
                    let network = match entry.parse::<IpAddr>() {
                        Ok(ip) => IpNet::new(ip, host_prefix_len(ip)).map_err(|e| e.to_string()),
                        Err(_) => entry
                            .parse::<IpNet>()
                            .map(|network| network.trunc())
                            .map_err(|e| e.to_string()),
                    };
                    match network {
                        Ok(network) => Some(network),
                        Err(e) => {
                            log::warn!("[{name}] invalid excluded network {entry:?} is ignored: {e}");
                            None
                        }
                    }
                })
                .collect(),
        )
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.iter().any(|network| network.contains(&ip))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
