use std::net::{Ipv4Addr, SocketAddr};

const API_ADDR: &str = "ALGOGUARD_API_ADDR";

const DEFAULT_API_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
    9967,
);

/// API listen address: `ALGOGUARD_API_ADDR` if set and valid, else the default
pub fn get_api_addr() -> SocketAddr {
    api_addr_override().unwrap_or(DEFAULT_API_ADDR)
}

/// Address from `ALGOGUARD_API_ADDR`, if set and parseable
pub fn api_addr_override() -> Option<SocketAddr> {
    parse_api_addr(std::env::var(API_ADDR).ok().as_deref())
}

fn parse_api_addr(value: Option<&str>) -> Option<SocketAddr> {
    value.and_then(|addr| addr.trim().parse().ok())
}

const WORKING_DIR: &str = "ALGOGUARD_WORKING_DIR";

/// Base working directory override, used when the config file sets none
pub fn get_working_dir() -> Option<std::path::PathBuf> {
    std::env::var(WORKING_DIR).ok().map(Into::into)
}
