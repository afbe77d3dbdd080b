//! Network reputation detection.

use super::{from_signals, DetectionContext, DetectionFinding, Detector, DetectorKind};
use crate::model::LocationSample;
use serde::{Deserialize, Serialize};

/// Result of an external IP reputation lookup.
///
/// Lookups are done by the caller before detectors run; the detector only
/// reads the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReputationSignal {
    /// The IP appears on a reputation denylist.
    pub denylisted: bool,
    /// Why, as reported by the source.
    pub reason: Option<String>,
}

impl ReputationSignal {
    /// A denylisted result.
    #[must_use]
    pub fn denylisted(reason: impl Into<String>) -> Self {
        Self {
            denylisted: true,
            reason: Some(reason.into()),
        }
    }

    /// A clean result.
    #[must_use]
    pub const fn clean() -> Self {
        Self {
            denylisted: false,
            reason: None,
        }
    }
}

/// Flags VPN, proxy and Tor traffic and denylisted client IPs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkReputationDetector;

impl Detector for NetworkReputationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::NetworkReputation
    }

    fn detect(&self, sample: &LocationSample, ctx: &DetectionContext<'_>) -> DetectionFinding {
        let kind = self.kind();
        let Some(network) = sample.network_info.as_ref() else {
            return DetectionFinding::insufficient_data(kind);
        };

        let mut signals = Vec::new();
        if network.is_vpn {
            signals.push((0.6, "connection through a VPN".to_string()));
        }
        if network.is_proxy {
            signals.push((0.6, "connection through a proxy".to_string()));
        }
        if network.is_tor {
            signals.push((0.8, "connection through Tor".to_string()));
        }
        if let Some(ip) = network.ip_address {
            if ctx.config.network.ip_denylist.contains(&ip) {
                signals.push((0.9, format!("IP {ip} is on the denylist")));
            }
        }
        if let Some(signal) = ctx.ip_reputation.filter(|s| s.denylisted) {
            let reason = signal.reason.as_deref().unwrap_or("listed");
            signals.push((0.9, format!("IP reputation: {reason}")));
        }

        from_signals(kind, signals, "network looks ordinary")
    }
}
