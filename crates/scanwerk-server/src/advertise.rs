// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS-SD advertisement of the scan endpoint.

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{info, warn};

use crate::server::SCAN_PATH;

/// DNS-SD service type of the endpoint.
pub const HTTP_SERVICE_TYPE: &str = "_http._tcp.local.";

/// A registered advertisement; call [`Advertisement::unregister`] on
/// shutdown.
pub struct Advertisement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Advertisement {
    /// Advertise the endpoint on `port`.
    ///
    /// Failures are logged and yield `None`: the service still works for
    /// clients that know its address.
    pub fn register(port: u16) -> Option<Self> {
        let daemon = match ServiceDaemon::new() {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "failed to create mDNS daemon for advertisement");
                return None;
            }
        };

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "scanwerk".into());
        let service_info = match service_info(&hostname, port) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "failed to create mDNS ServiceInfo");
                shutdown(&daemon);
                return None;
            }
        };

        let fullname = service_info.get_fullname().to_owned();
        if let Err(e) = daemon.register(service_info) {
            warn!(error = %e, "failed to register mDNS service");
            shutdown(&daemon);
            return None;
        }
        info!(
            service_type = HTTP_SERVICE_TYPE,
            name = %fullname,
            port,
            "mDNS service registered"
        );
        Some(Self { daemon, fullname })
    }

    /// Withdraw the advertisement and stop the daemon.
    pub fn unregister(self) {
        match self.daemon.unregister(&self.fullname) {
            Ok(_) => info!(name = %self.fullname, "mDNS service unregistered"),
            Err(e) => warn!(error = %e, "failed to unregister mDNS service"),
        }
        shutdown(&self.daemon);
    }
}

fn shutdown(daemon: &ServiceDaemon) {
    if let Err(e) = daemon.shutdown() {
        warn!(error = %e, "failed to shut down mDNS daemon");
    }
}

/// Service record for this host; the TXT `path` tells clients which URL to
/// fetch.
fn service_info(hostname: &str, port: u16) -> Result<ServiceInfo, mdns_sd::Error> {
    let host = hostname.trim_end_matches('.');
    let properties = [("txtvers", "1"), ("path", SCAN_PATH)];
    ServiceInfo::new(
        HTTP_SERVICE_TYPE,
        &format!("Scanwerk on {host}"),
        &format!("{host}.local."),
        "",
        port,
        &properties[..],
    )
    .map(ServiceInfo::enable_addr_auto)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_points_at_the_scan_path() {
        let info = service_info("office", 3000).expect("service info");
        assert_eq!(info.get_type(), HTTP_SERVICE_TYPE);
        assert_eq!(info.get_port(), 3000);
        assert_eq!(info.get_hostname(), "office.local.");
        assert_eq!(info.get_fullname(), "Scanwerk on office._http._tcp.local.");
        assert_eq!(info.get_property_val_str("path"), Some(SCAN_PATH));
    }
}
