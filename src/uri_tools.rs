use hyper::http::{uri::PathAndQuery, Error, Uri};

/// Append a request path and query to the upstream base URI
pub fn compose_uri(base_uri: &Uri, path_and_query: &PathAndQuery) -> Result<Uri, Error> {
    let new_path = [
        base_uri.path().trim_end_matches('/'),
        path_and_query.as_str(),
    ]
    .concat();
    let mut builder = Uri::builder();
    if let Some(scheme) = base_uri.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = base_uri.authority() {
        builder = builder.authority(authority.clone());
    }
    builder.path_and_query(new_path).build()
}
