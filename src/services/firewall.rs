//! DNS blocking and MAC blocking on the home router.

use std::sync::{Mutex, MutexGuard, PoisonError};

use protocol::domain::FirewallState;
use tracing::info;

use super::{DomainError, EventSource, Listener, ListenerKey, ListenerSet, now_ms};
use crate::settings::FirewallSettings;

pub trait Firewall: EventSource<FirewallState> {
    fn firewall_state(&self) -> FirewallState;

    /// Replace the enabled DNS blocking lists.
    ///
    /// # Errors
    ///
    /// [`DomainError::Invalid`] when a list is not one of the standard lists.
    fn set_dns_blocking_lists(&self, lists: Vec<String>) -> Result<(), DomainError>;

    /// Refresh the standard block lists from upstream.
    ///
    /// # Errors
    ///
    /// Reserved for download failures.
    fn update_standard_lists(&self) -> Result<(), DomainError>;

    /// Replace the set of blocked devices.
    ///
    /// # Errors
    ///
    /// [`DomainError::Invalid`] for a malformed MAC address.
    fn set_blocked_macs(&self, macs: Vec<String>) -> Result<(), DomainError>;
}

pub struct SimFirewall {
    state: Mutex<FirewallState>,
    listeners: ListenerSet<FirewallState>,
}

impl SimFirewall {
    #[must_use]
    pub fn new(settings: &FirewallSettings) -> Self {
        Self {
            state: Mutex::new(FirewallState {
                dns_blocking_lists: settings.dns_blocking_lists.clone(),
                available_standard_lists: settings.standard_lists.clone(),
                blocked_macs: settings.blocked_macs.iter().map(|m| m.to_ascii_lowercase()).collect(),
                standard_lists_updated_ms: None,
            }),
            listeners: ListenerSet::new(),
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, FirewallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, change: impl FnOnce(&mut FirewallState)) {
        let snapshot = {
            let mut state = self.lock();
            change(&mut state);
            state.clone()
        };
        self.listeners.emit(&snapshot);
    }
}

/// Six colon-separated hex octets, e.g. `a4:83:e7:01:bc:9f`.
fn is_mac(candidate: &str) -> bool {
    let octets: Vec<&str> = candidate.split(':').collect();
    octets.len() == 6 && octets.iter().all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

impl Firewall for SimFirewall {
    fn firewall_state(&self) -> FirewallState {
        self.lock().clone()
    }

    fn set_dns_blocking_lists(&self, mut lists: Vec<String>) -> Result<(), DomainError> {
        {
            let state = self.lock();
            if let Some(unknown) = lists.iter().find(|l| !state.available_standard_lists.contains(*l)) {
                return Err(DomainError::Invalid {
                    field: "dnsBlockingLists",
                    reason: format!("{unknown} is not a standard list"),
                });
            }
        }
        lists.sort();
        lists.dedup();
        info!(lists = ?lists, "dns blocking lists set");
        self.update(|state| state.dns_blocking_lists = lists);
        Ok(())
    }

    fn update_standard_lists(&self) -> Result<(), DomainError> {
        info!("standard block lists refreshed");
        self.update(|state| state.standard_lists_updated_ms = Some(now_ms()));
        Ok(())
    }

    fn set_blocked_macs(&self, macs: Vec<String>) -> Result<(), DomainError> {
        if let Some(bad) = macs.iter().find(|m| !is_mac(m)) {
            return Err(DomainError::Invalid { field: "blockedMacs", reason: format!("{bad} is not a MAC address") });
        }
        let mut macs: Vec<String> = macs.iter().map(|m| m.to_ascii_lowercase()).collect();
        macs.sort();
        macs.dedup();
        self.update(|state| state.blocked_macs = macs);
        Ok(())
    }
}

impl EventSource<FirewallState> for SimFirewall {
    fn current(&self, _owner: Option<&str>) -> Option<FirewallState> {
        Some(self.firewall_state())
    }

    fn add_listener(&self, _owner: Option<&str>, key: ListenerKey, listener: Listener<FirewallState>) {
        self.listeners.insert(key, listener);
    }

    fn remove_listener(&self, key: &ListenerKey) {
        self.listeners.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firewall() -> SimFirewall {
        SimFirewall::new(&FirewallSettings {
            standard_lists: vec!["ads".into(), "malware".into()],
            dns_blocking_lists: vec![],
            blocked_macs: vec![],
        })
    }

    #[test]
    fn mac_validation() {
        assert!(is_mac("A4:83:e7:01:bc:9f"));
        assert!(!is_mac("a4:83:e7:01:bc"));
        assert!(!is_mac("a4:83:e7:01:bc:zz"));
    }

    #[test]
    fn blocked_macs_are_normalized() {
        let firewall = firewall();
        firewall.set_blocked_macs(vec!["AA:BB:CC:DD:EE:FF".into(), "aa:bb:cc:dd:ee:ff".into()]).unwrap();
        assert_eq!(firewall.firewall_state().blocked_macs, vec!["aa:bb:cc:dd:ee:ff".to_string()]);

        let err = firewall.set_blocked_macs(vec!["router".into()]).unwrap_err();
        assert!(matches!(err, DomainError::Invalid { field: "blockedMacs", .. }));
    }

    #[test]
    fn only_standard_lists_can_be_enabled() {
        let firewall = firewall();
        assert!(firewall.set_dns_blocking_lists(vec!["gambling".into()]).is_err());
        firewall.set_dns_blocking_lists(vec!["malware".into(), "ads".into()]).unwrap();
        assert_eq!(firewall.firewall_state().dns_blocking_lists, vec!["ads".to_string(), "malware".to_string()]);
    }

    #[test]
    fn refreshing_lists_stamps_the_state() {
        let firewall = firewall();
        firewall.update_standard_lists().unwrap();
        assert!(firewall.current(None).unwrap().standard_lists_updated_ms.is_some());
    }
}
