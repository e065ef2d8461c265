use maxminddb::MaxMindDBError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error(r#"unable to determine GeoIP database type from path {0:?}, it must contain "City" or "Country""#)]
    UnknownDatabaseType(PathBuf),
    #[error(transparent)]
    MaxMindDBError(#[from] MaxMindDBError),
}
