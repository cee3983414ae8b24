//! Engine settings and trusted proxy matching.

use crate::binding::StructValidator;
use crate::error::ProxyError;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

/// Header set by Cloudflare with the connecting client address.
pub const PLATFORM_CLOUDFLARE: &str = "CF-Connecting-IP";
/// Header set by Google App Engine with the connecting client address.
pub const PLATFORM_GOOGLE_APP_ENGINE: &str = "X-Appengine-Remote-Addr";
/// Header set by Fly.io with the connecting client address.
pub const PLATFORM_FLY_IO: &str = "Fly-Client-IP";

pub const DEFAULT_SECURE_JSON_PREFIX: &str = "while(1);";
pub const DEFAULT_MULTIPART_MEMORY: u64 = 32 << 20;

/// Behaviour flags read by the engine and contexts while serving.
///
/// Written before serving starts, read lock-free afterwards.
#[derive(Clone)]
pub struct EngineConfig {
    /// Redirect `/foo/` to `/foo` (or the reverse) when only the other form
    /// is registered. 301 for GET, 307 for other methods.
    pub redirect_trailing_slash: bool,
    /// On a miss, look for a case-insensitive match of the cleaned path and
    /// redirect to it.
    pub redirect_fixed_path: bool,
    /// Answer 405 with an `Allow` header when the path exists under other
    /// methods only.
    pub handle_method_not_allowed: bool,
    /// Resolve the client address from `remote_ip_headers` when the peer is
    /// a trusted proxy.
    pub forwarded_by_client_ip: bool,
    pub remote_ip_headers: Vec<String>,
    /// Header of a trusted platform (e.g. [`PLATFORM_CLOUDFLARE`]) that
    /// carries the client address and takes precedence over everything else.
    pub trusted_platform: Option<String>,
    /// Match on the raw (still escaped) path instead of the decoded one.
    pub use_raw_path: bool,
    /// Percent-decode parameter values taken from the raw path.
    pub unescape_path_values: bool,
    /// Collapse repeated slashes before matching.
    pub remove_extra_slash: bool,
    /// Memory budget for multipart parsing; larger file parts go to disk.
    pub max_multipart_memory: u64,
    pub secure_json_prefix: String,
    pub validator: Option<Arc<dyn StructValidator>>,
    trusted_proxies: Vec<IpNet>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            redirect_fixed_path: false,
            handle_method_not_allowed: false,
            forwarded_by_client_ip: true,
            remote_ip_headers: vec!["X-Forwarded-For".to_string(), "X-Real-IP".to_string()],
            trusted_platform: None,
            use_raw_path: false,
            unescape_path_values: true,
            remove_extra_slash: false,
            max_multipart_memory: DEFAULT_MULTIPART_MEMORY,
            secure_json_prefix: DEFAULT_SECURE_JSON_PREFIX.to_string(),
            validator: None,
            trusted_proxies: vec![IpNet::ANY_V4, IpNet::ANY_V6],
        }
    }
}

impl EngineConfig {
    /// Replaces the trusted proxy list. Entries are CIDR blocks or single
    /// addresses; an empty list trusts no proxy.
    pub fn set_trusted_proxies<I, S>(&mut self, proxies: I) -> Result<(), ProxyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = proxies.into_iter().map(|proxy| proxy.as_ref().parse()).collect::<Result<Vec<IpNet>, _>>()?;
        self.trusted_proxies = parsed;
        Ok(())
    }

    pub fn trusted_proxies(&self) -> &[IpNet] {
        &self.trusted_proxies
    }

    pub(crate) fn is_trusted_proxy(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(ip))
    }

    /// Walks a comma separated forwarding header from the right and returns
    /// the first address not belonging to a trusted proxy (or the left-most).
    pub(crate) fn validate_forwarded(&self, header: &str) -> Option<String> {
        if header.is_empty() {
            return None;
        }
        let items: Vec<&str> = header.split(',').collect();
        for (i, item) in items.iter().enumerate().rev() {
            let candidate = item.trim();
            let Ok(ip) = candidate.parse::<IpAddr>() else {
                break;
            };
            if i == 0 || !self.is_trusted_proxy(ip) {
                return Some(candidate.to_string());
            }
        }
        None
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("redirect_trailing_slash", &self.redirect_trailing_slash)
            .field("redirect_fixed_path", &self.redirect_fixed_path)
            .field("handle_method_not_allowed", &self.handle_method_not_allowed)
            .field("forwarded_by_client_ip", &self.forwarded_by_client_ip)
            .field("remote_ip_headers", &self.remote_ip_headers)
            .field("trusted_platform", &self.trusted_platform)
            .field("use_raw_path", &self.use_raw_path)
            .field("unescape_path_values", &self.unescape_path_values)
            .field("remove_extra_slash", &self.remove_extra_slash)
            .field("max_multipart_memory", &self.max_multipart_memory)
            .field("secure_json_prefix", &self.secure_json_prefix)
            .field("validator", &self.validator.is_some())
            .field("trusted_proxies", &self.trusted_proxies)
            .finish()
    }
}

/// An IP network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNet {
    addr: IpAddr,
    prefix: u8,
}

impl IpNet {
    pub const ANY_V4: IpNet = IpNet { addr: IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), prefix: 0 };
    pub const ANY_V6: IpNet = IpNet { addr: IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), prefix: 0 };

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.prefix)).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.prefix)).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpNet {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProxyError { value: s.to_string() };
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr: IpAddr = addr.trim().parse().map_err(|_| invalid())?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(prefix) => prefix.trim().parse::<u8>().map_err(|_| invalid())?,
            None => max,
        };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}
