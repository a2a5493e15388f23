//! Pure routing decisions.
//!
//! Given the translator, the tracker and the gateway's own identities, decide
//! which network a message leaves on and which addresses its frames carry.

use meshgate_core::{Address, CryptoIdentity, Network, RadioNodeId};

use crate::tracker::NodeTracker;
use crate::translator::AddressTranslator;

/// The gateway's own identity on each mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    pub crypto: CryptoIdentity,
    pub radio: RadioNodeId,
}

impl LocalIdentity {
    pub fn address_on(&self, network: Network) -> Address {
        match network {
            Network::CryptoMesh => Address::Crypto(self.crypto),
            Network::RadioMesh => Address::Radio(self.radio),
        }
    }

    pub fn is_local(&self, address: &Address) -> bool {
        match address {
            Address::Crypto(c) => *c == self.crypto,
            Address::Radio(r) => *r == self.radio,
        }
    }
}

/// Where and how a message is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub network: Network,
    pub source: Address,
    pub destination: Address,
    /// The translator mapping this route depends on, confirmed on ack.
    pub mapping: Option<(CryptoIdentity, RadioNodeId)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Send(Route),
    /// No mapping and no sighting yet; wait for an announce.
    AwaitAddress,
    /// The destination is the gateway itself.
    Local,
}

/// Route a locally submitted message.
pub fn plan_route(
    destination: &Address,
    translator: &AddressTranslator,
    tracker: &NodeTracker,
    local: &LocalIdentity,
) -> RouteDecision {
    if local.is_local(destination) {
        return RouteDecision::Local;
    }
    match destination {
        Address::Radio(node) => RouteDecision::Send(Route {
            network: Network::RadioMesh,
            source: local.address_on(Network::RadioMesh),
            destination: Address::Radio(*node),
            mapping: None,
        }),
        Address::Crypto(identity) => {
            let lives_on_crypto = tracker.origin_of(destination) == Some(Network::CryptoMesh);
            match translator.resolve_crypto(identity) {
                Some(node) if !lives_on_crypto => RouteDecision::Send(Route {
                    network: Network::RadioMesh,
                    source: local.address_on(Network::RadioMesh),
                    destination: Address::Radio(node),
                    mapping: Some((*identity, node)),
                }),
                _ if lives_on_crypto => RouteDecision::Send(Route {
                    network: Network::CryptoMesh,
                    source: local.address_on(Network::CryptoMesh),
                    destination: *destination,
                    mapping: None,
                }),
                _ => RouteDecision::AwaitAddress,
            }
        }
    }
}

/// Decide whether an inbound message should cross to the opposite network.
///
/// The forwarded source is rewritten to its counterpart identity when the
/// translator knows one.
pub fn plan_forward(
    origin: Network,
    source: &Address,
    destination: &Address,
    translator: &AddressTranslator,
    local: &LocalIdentity,
) -> Option<Route> {
    if local.is_local(destination) {
        return None;
    }

    let (target, mapping) = match (origin, destination) {
        (Network::RadioMesh, Address::Crypto(c)) => (Address::Crypto(*c), None),
        (Network::RadioMesh, Address::Radio(n)) => {
            if n.is_broadcast() {
                return None;
            }
            let c = translator.resolve_radio(n)?;
            (Address::Crypto(c), Some((c, *n)))
        }
        (Network::CryptoMesh, Address::Radio(n)) => (Address::Radio(*n), None),
        (Network::CryptoMesh, Address::Crypto(c)) => {
            let n = translator.resolve_crypto(c)?;
            (Address::Radio(n), Some((*c, n)))
        }
    };

    let network = origin.opposite();
    let rewritten_source = match (network, source) {
        (Network::RadioMesh, Address::Crypto(c)) => translator
            .resolve_crypto(c)
            .map(Address::Radio)
            .unwrap_or(*source),
        (Network::CryptoMesh, Address::Radio(n)) => translator
            .resolve_radio(n)
            .map(Address::Crypto)
            .unwrap_or(*source),
        _ => *source,
    };

    Some(Route {
        network,
        source: rewritten_source,
        destination: target,
        mapping,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgate_core::AnnounceEvent;
    use std::time::Instant;

    fn c(b: u8) -> CryptoIdentity {
        CryptoIdentity::new([b; 16])
    }

    fn r(n: u32) -> RadioNodeId {
        RadioNodeId::new(n)
    }

    fn local() -> LocalIdentity {
        LocalIdentity {
            crypto: c(0xEE),
            radio: r(0xEEEE),
        }
    }

    #[test]
    fn radio_destination_routes_on_radio() {
        let decision = plan_route(
            &Address::Radio(r(5)),
            &AddressTranslator::new(),
            &NodeTracker::default(),
            &local(),
        );
        assert_eq!(
            decision,
            RouteDecision::Send(Route {
                network: Network::RadioMesh,
                source: Address::Radio(r(0xEEEE)),
                destination: Address::Radio(r(5)),
                mapping: None,
            })
        );
    }

    #[test]
    fn mapped_crypto_destination_routes_on_radio() {
        let mut t = AddressTranslator::new();
        t.learn(c(1), r(10), false, 0).unwrap();
        let RouteDecision::Send(route) =
            plan_route(&Address::Crypto(c(1)), &t, &NodeTracker::default(), &local())
        else {
            panic!("expected a route");
        };
        assert_eq!(route.network, Network::RadioMesh);
        assert_eq!(route.destination, Address::Radio(r(10)));
        assert_eq!(route.mapping, Some((c(1), r(10))));
    }

    #[test]
    fn crypto_native_destination_stays_on_crypto() {
        let mut t = AddressTranslator::new();
        let mut tracker = NodeTracker::default();
        tracker.observe(
            &AnnounceEvent::Crypto {
                identity: c(2),
                display_name: String::new(),
                link_quality: None,
            },
            Network::CryptoMesh,
            Instant::now(),
            &mut t,
        );
        let RouteDecision::Send(route) = plan_route(&Address::Crypto(c(2)), &t, &tracker, &local())
        else {
            panic!("expected a route");
        };
        assert_eq!(route.network, Network::CryptoMesh);
        assert_eq!(route.source, Address::Crypto(c(0xEE)));
    }

    #[test]
    fn unknown_crypto_destination_waits() {
        assert_eq!(
            plan_route(
                &Address::Crypto(c(3)),
                &AddressTranslator::new(),
                &NodeTracker::default(),
                &local()
            ),
            RouteDecision::AwaitAddress
        );
    }

    #[test]
    fn local_destination_rejected() {
        assert_eq!(
            plan_route(
                &Address::Radio(r(0xEEEE)),
                &AddressTranslator::new(),
                &NodeTracker::default(),
                &local()
            ),
            RouteDecision::Local
        );
    }

    #[test]
    fn forward_radio_to_mapped_alias() {
        let mut t = AddressTranslator::new();
        t.learn(c(1), r(10), true, 0).unwrap();
        t.learn(c(2), r(20), true, 0).unwrap();
        let route = plan_forward(
            Network::RadioMesh,
            &Address::Radio(r(20)),
            &Address::Radio(r(10)),
            &t,
            &local(),
        )
        .unwrap();
        assert_eq!(route.network, Network::CryptoMesh);
        assert_eq!(route.destination, Address::Crypto(c(1)));
        assert_eq!(route.source, Address::Crypto(c(2)));
    }

    #[test]
    fn forward_crypto_to_explicit_radio_keeps_unmapped_source() {
        let route = plan_forward(
            Network::CryptoMesh,
            &Address::Crypto(c(9)),
            &Address::Radio(r(4)),
            &AddressTranslator::new(),
            &local(),
        )
        .unwrap();
        assert_eq!(route.network, Network::RadioMesh);
        assert_eq!(route.source, Address::Crypto(c(9)));
        assert_eq!(route.mapping, None);
    }

    #[test]
    fn no_forward_for_local_broadcast_or_unmapped() {
        let t = AddressTranslator::new();
        assert!(
            plan_forward(
                Network::RadioMesh,
                &Address::Radio(r(1)),
                &Address::Radio(r(0xEEEE)),
                &t,
                &local()
            )
            .is_none()
        );
        assert!(
            plan_forward(
                Network::RadioMesh,
                &Address::Radio(r(1)),
                &Address::Radio(RadioNodeId::BROADCAST),
                &t,
                &local()
            )
            .is_none()
        );
        assert!(
            plan_forward(
                Network::CryptoMesh,
                &Address::Crypto(c(1)),
                &Address::Crypto(c(2)),
                &t,
                &local()
            )
            .is_none()
        );
    }
}
