//! Role-gated listener activation.
//!
//! The hello listener only makes sense on a node that can collect telemetry, i.e. one
//! that is a Router or the Leader. The activator keeps an explicit armed flag so that
//! repeated role events never bind the port twice, and closes the listener again when
//! the node is demoted.

use log::{debug, error, info};

use crate::error::NodeError;
use crate::mesh::{MeshRole, MeshStack, SocketId};

/// Open a socket and bind it to `port`. If the bind fails the opened socket is closed
/// again before the error is returned.
pub fn open_listener<M: MeshStack + ?Sized>(
    mesh: &mut M,
    port: u16,
    what: &'static str,
) -> Result<SocketId, NodeError> {
    let socket = mesh
        .udp_open()
        .map_err(|source| NodeError::ResourceUnavailable { what, source })?;
    if let Err(source) = mesh.udp_bind(socket, port) {
        mesh.udp_close(socket);
        return Err(NodeError::ResourceUnavailable { what, source });
    }
    Ok(socket)
}

/// What a role change did to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    Armed,
    AlreadyArmed,
    Disarmed,
    /// Role does not qualify and nothing was open.
    NotEligible,
    /// An earlier attempt in this router-capable stretch failed; waiting for a
    /// non-qualifying role before trying again.
    Failed,
    /// Activation disabled for this node.
    Disabled,
}

#[derive(Debug)]
pub struct ListenerActivator {
    port: u16,
    enabled: bool,
    socket: Option<SocketId>,
    failed: bool,
}

impl ListenerActivator {
    pub fn new(port: u16, enabled: bool) -> Self {
        Self {
            port,
            enabled,
            socket: None,
            failed: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.socket.is_some()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// React to a role change. Open failures leave the node without a listener; further
    /// qualifying events are no-ops until the node drops to a non-qualifying role.
    pub fn on_role_changed<M: MeshStack + ?Sized>(
        &mut self,
        mesh: &mut M,
        role: MeshRole,
    ) -> Result<ArmOutcome, NodeError> {
        if !self.enabled {
            return Ok(ArmOutcome::Disabled);
        }
        match (role.is_router_capable(), self.socket) {
            (true, Some(_)) => {
                debug!("Hello listener already armed ({})", role);
                Ok(ArmOutcome::AlreadyArmed)
            }
            (true, None) if self.failed => {
                debug!("Hello listener failed earlier; not retrying as {}", role);
                Ok(ArmOutcome::Failed)
            }
            (true, None) => match open_listener(mesh, self.port, "hello listener") {
                Ok(socket) => {
                    self.socket = Some(socket);
                    info!("Hello listener armed on port {} as {}", self.port, role);
                    Ok(ArmOutcome::Armed)
                }
                Err(e) => {
                    self.failed = true;
                    error!("Failed to arm hello listener on port {}: {}", self.port, e);
                    Err(e)
                }
            },
            (false, Some(socket)) => {
                mesh.udp_close(socket);
                self.socket = None;
                info!("Hello listener on port {} closed ({})", self.port, role);
                Ok(ArmOutcome::Disarmed)
            }
            (false, None) => {
                self.failed = false;
                Ok(ArmOutcome::NotEligible)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::sim::SimMesh;
    use crate::mesh::HELLO_PORT;

    #[test]
    fn repeated_router_events_bind_once() {
        let mut mesh = SimMesh::new();
        let mut act = ListenerActivator::new(HELLO_PORT, true);
        let outcomes: Vec<_> = [
            MeshRole::Detached,
            MeshRole::Child,
            MeshRole::Router,
            MeshRole::Router,
            MeshRole::Leader,
        ]
        .into_iter()
        .map(|r| act.on_role_changed(&mut mesh, r).unwrap())
        .collect();
        assert_eq!(
            outcomes,
            vec![
                ArmOutcome::NotEligible,
                ArmOutcome::NotEligible,
                ArmOutcome::Armed,
                ArmOutcome::AlreadyArmed,
                ArmOutcome::AlreadyArmed,
            ]
        );
        assert_eq!(mesh.bind_count(HELLO_PORT), 1);
    }

    #[test]
    fn bind_failure_closes_socket_and_stays_unarmed() {
        let mut mesh = SimMesh::new();
        mesh.fail_bind = true;
        let mut act = ListenerActivator::new(HELLO_PORT, true);
        let err = act.on_role_changed(&mut mesh, MeshRole::Leader).unwrap_err();
        assert_eq!(err.kind(), "resource_unavailable");
        assert!(!act.is_armed());
        assert_eq!(mesh.open_socket_count(), 0);
    }

    #[test]
    fn failed_arm_is_not_retried_until_role_drops() {
        let mut mesh = SimMesh::new();
        mesh.fail_bind = true;
        let mut act = ListenerActivator::new(HELLO_PORT, true);
        assert!(act.on_role_changed(&mut mesh, MeshRole::Router).is_err());
        mesh.fail_bind = false;
        assert_eq!(act.on_role_changed(&mut mesh, MeshRole::Router).unwrap(), ArmOutcome::Failed);
        assert_eq!(act.on_role_changed(&mut mesh, MeshRole::Leader).unwrap(), ArmOutcome::Failed);
        assert_eq!(mesh.bind_count(HELLO_PORT), 1);

        assert_eq!(act.on_role_changed(&mut mesh, MeshRole::Child).unwrap(), ArmOutcome::NotEligible);
        assert_eq!(act.on_role_changed(&mut mesh, MeshRole::Router).unwrap(), ArmOutcome::Armed);
        assert_eq!(mesh.bind_count(HELLO_PORT), 2);
    }

    #[test]
    fn demotion_tears_down_and_rearms_later() {
        let mut mesh = SimMesh::new();
        let mut act = ListenerActivator::new(HELLO_PORT, true);
        act.on_role_changed(&mut mesh, MeshRole::Router).unwrap();
        assert_eq!(act.on_role_changed(&mut mesh, MeshRole::Child).unwrap(), ArmOutcome::Disarmed);
        assert!(!mesh.is_port_bound(HELLO_PORT));
        assert_eq!(act.on_role_changed(&mut mesh, MeshRole::Router).unwrap(), ArmOutcome::Armed);
        assert_eq!(mesh.bind_count(HELLO_PORT), 2);
    }

    #[test]
    fn disabled_never_opens() {
        let mut mesh = SimMesh::new();
        let mut act = ListenerActivator::new(HELLO_PORT, false);
        assert_eq!(act.on_role_changed(&mut mesh, MeshRole::Leader).unwrap(), ArmOutcome::Disabled);
        assert_eq!(mesh.open_socket_count(), 0);
    }
}
