//! Cluster node addresses.

/// Port appended to addresses that do not name one.
pub const DEFAULT_PORT: u16 = 6379;

/// One node the pool may connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    /// `host:port`, or `[v6]:port`.
    pub address: String,
    pub use_tls: bool,
}

impl DialTarget {
    pub fn new(address: impl Into<String>, use_tls: bool) -> Self {
        Self {
            address: address.into(),
            use_tls,
        }
    }

    /// Host part of the address, used for TLS server name indication.
    pub fn host(&self) -> &str {
        let addr = self.address.as_str();
        if let Some(rest) = addr.strip_prefix('[') {
            return rest.split_once(']').map_or(rest, |(host, _)| host);
        }
        addr.rsplit_once(':').map_or(addr, |(host, _)| host)
    }
}

/// Normalize a list of node addresses.
///
/// Blank entries are dropped and [`DEFAULT_PORT`] is appended to entries that
/// carry no port. Bare IPv6 literals are bracketed.
pub fn parse_addresses<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(with_default_port)
        .collect()
}

/// Split a comma-separated address list, as used by `REDIS_ADDRESSES` and
/// `--addrs`.
pub fn split_address_list(list: &str) -> Vec<String> {
    parse_addresses(&list.split(',').collect::<Vec<_>>())
}

fn with_default_port(addr: &str) -> String {
    if addr.starts_with('[') {
        return if addr.ends_with(']') {
            format!("{addr}:{DEFAULT_PORT}")
        } else {
            addr.to_string()
        };
    }
    match addr.matches(':').count() {
        0 => format!("{addr}:{DEFAULT_PORT}"),
        1 => addr.to_string(),
        _ => format!("[{addr}]:{DEFAULT_PORT}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_appended() {
        assert_eq!(
            parse_addresses(&["cache-1", "cache-2:7000", "  ", ""]),
            vec!["cache-1:6379".to_string(), "cache-2:7000".to_string()]
        );
    }

    #[test]
    fn ipv6_literals_are_bracketed() {
        assert_eq!(
            parse_addresses(&["::1", "[fe80::1]", "[fe80::2]:7001"]),
            vec![
                "[::1]:6379".to_string(),
                "[fe80::1]:6379".to_string(),
                "[fe80::2]:7001".to_string()
            ]
        );
    }

    #[test]
    fn comma_list_is_trimmed() {
        assert_eq!(
            split_address_list(" a:1 , b ,,"),
            vec!["a:1".to_string(), "b:6379".to_string()]
        );
        assert!(split_address_list(" , ").is_empty());
    }

    #[test]
    fn host_strips_port_and_brackets() {
        assert_eq!(DialTarget::new("cache.internal:6380", true).host(), "cache.internal");
        assert_eq!(DialTarget::new("[::1]:6379", true).host(), "::1");
        assert_eq!(DialTarget::new("localhost", false).host(), "localhost");
    }
}
