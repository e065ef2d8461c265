use hyper::HeaderMap;

/// Client address reported by proxies, if any.
///
/// The first header of `header_names` present in the request is used. With `recursive` the first
/// (client-most) value is taken, otherwise the last one. Blank values count as absent.
pub fn forwarded_ip<'a>(
    headers: &'a HeaderMap,
    header_names: &[String],
    recursive: bool,
) -> Option<&'a str> {
    header_names
        .iter()
        .filter_map(|name| {
            let values = headers.get_all(name.as_str());
            let mut it_values = values.iter();
            if recursive {
                it_values.next()
            } else {
                it_values.next_back()
            }
        })
        .next()
        .and_then(|value| {
            let value = value.to_str().ok()?;
            let mut split = value.split(',');
            if recursive {
                split.next()
            } else {
                split.next_back()
            }
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Host part of a transport address like `1.2.3.4:80` or `[::1]:80`.
///
/// The port itself is not validated. Anything without a `:port` suffix is returned unchanged.
pub fn strip_port(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, port)) = rest.split_once(']') {
            if port.starts_with(':') {
                return host;
            }
        }
        return address;
    }
    match address.rsplit_once(':') {
        Some((host, _port)) if !host.contains(':') => host,
        _ => address,
    }
}

/// Candidate client address: forwarded header first, transport address otherwise
pub fn client_ip_candidate<'a>(
    headers: &'a HeaderMap,
    header_names: &[String],
    recursive: bool,
    remote_addr: &'a str,
) -> &'a str {
    forwarded_ip(headers, header_names, recursive).unwrap_or_else(|| strip_port(remote_addr))
}
