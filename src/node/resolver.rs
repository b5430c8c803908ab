//! Destination resolution for telemetry.
//!
//! The default policy finds the current default-route provider (the border router)
//! in the network data on every call. Nothing is cached: border routers come and go
//! and the next send must follow them.

use log::debug;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;

use crate::mesh::{rloc_address, MeshStack, REALM_LOCAL_ALL_NODES};

/// Where hello messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DestinationPolicy {
    /// RLOC of the first network-data entry that offers a default route.
    #[default]
    DefaultRoute,
    /// RLOC of the current partition leader.
    LeaderRloc,
    /// Realm-local all-nodes multicast.
    Multicast,
}

/// First on-mesh prefix with the default-route flag, in enumeration order, mapped to
/// the advertiser's RLOC address. `None` when nothing qualifies or the mesh-local
/// prefix is not known yet.
pub fn resolve_default_route<M: MeshStack + ?Sized>(mesh: &M) -> Option<Ipv6Addr> {
    let prefix = mesh.mesh_local_prefix()?;
    let entry = mesh
        .on_mesh_prefixes()
        .into_iter()
        .find(|p| p.default_route)?;
    let addr = rloc_address(prefix, entry.rloc16);
    debug!(
        "Default route via {}/{} from rloc16 0x{:04x} -> {}",
        entry.prefix, entry.length, entry.rloc16, addr
    );
    Some(addr)
}

pub fn resolve<M: MeshStack + ?Sized>(policy: DestinationPolicy, mesh: &M) -> Option<Ipv6Addr> {
    match policy {
        DestinationPolicy::DefaultRoute => resolve_default_route(mesh),
        DestinationPolicy::LeaderRloc => match mesh.leader_rloc() {
            Ok(addr) => Some(addr),
            Err(e) => {
                debug!("Leader RLOC unavailable: {}", e);
                None
            }
        },
        DestinationPolicy::Multicast => Some(REALM_LOCAL_ALL_NODES),
    }
}
