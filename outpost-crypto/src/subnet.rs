//! The trusted-subnet origin check.
//!
//! When a CIDR is configured, inbound requests must originate from inside
//! it: HTTP requests carry the client address in `X-Real-IP`, gRPC requests
//! use the peer address of the connection. An unset CIDR disables the check.

use std::net::IpAddr;

use ipnetwork::IpNetwork;

/// The verdict of the trusted-subnet check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetCheck {
    /// No subnet is configured; all origins pass.
    Disabled,
    /// The origin is inside the trusted subnet.
    Allowed,
    /// The origin is missing, unparsable, or outside the subnet.
    Denied,
}

impl SubnetCheck {
    /// Returns `true` unless the origin was denied.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, SubnetCheck::Denied)
    }
}

/// Checks a textual client address against the trusted subnet.
///
/// Used by the HTTP middleware, where the address comes from the
/// `X-Real-IP` header and may be absent or malformed.
pub fn check_origin(subnet: Option<&IpNetwork>, origin: Option<&str>) -> SubnetCheck {
    let Some(subnet) = subnet else {
        return SubnetCheck::Disabled;
    };

    match origin.and_then(|raw| raw.trim().parse::<IpAddr>().ok()) {
        Some(ip) => check_ip(Some(subnet), ip),
        None => SubnetCheck::Denied,
    }
}

/// Checks an already-parsed client address against the trusted subnet.
///
/// Used by the gRPC service, where the peer address is known exactly.
pub fn check_ip(subnet: Option<&IpNetwork>, ip: IpAddr) -> SubnetCheck {
    match subnet {
        None => SubnetCheck::Disabled,
        Some(subnet) if subnet.contains(ip) => SubnetCheck::Allowed,
        Some(_) => SubnetCheck::Denied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet() -> IpNetwork {
        "10.0.0.0/8".parse().unwrap()
    }

    #[test]
    fn no_subnet_disables_check() {
        assert_eq!(check_origin(None, None), SubnetCheck::Disabled);
        assert_eq!(
            check_origin(None, Some("192.168.1.1")),
            SubnetCheck::Disabled
        );
    }

    #[test]
    fn inside_subnet_passes() {
        let subnet = subnet();
        assert_eq!(
            check_origin(Some(&subnet), Some("10.2.3.4")),
            SubnetCheck::Allowed
        );
    }

    #[test]
    fn outside_subnet_denied() {
        let subnet = subnet();
        assert_eq!(
            check_origin(Some(&subnet), Some("192.168.1.1")),
            SubnetCheck::Denied
        );
    }

    #[test]
    fn missing_or_malformed_origin_denied() {
        let subnet = subnet();
        assert_eq!(check_origin(Some(&subnet), None), SubnetCheck::Denied);
        assert_eq!(
            check_origin(Some(&subnet), Some("not-an-ip")),
            SubnetCheck::Denied
        );
    }
}
