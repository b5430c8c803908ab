//! Host-side mesh stack.
//!
//! `HostMesh` sends and receives real UDP through the operating system's IPv6 stack,
//! which on an OpenThread border-router host reaches the mesh through the Thread
//! network interface (usually `wpan0`). The topology view the node core asks for
//! (role, mesh-local prefix, network data, leader) is not available through plain
//! sockets, so it is supplied from configuration and updated at runtime through the
//! console.
//!
//! Sends are synchronous and non-blocking. Each bound socket gets a Tokio reader
//! task that forwards datagrams into an unbounded channel; the runtime turns those
//! into node events so the node is still driven from a single task.

use std::collections::HashMap;
use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6, UdpSocket as StdUdpSocket};
use std::sync::Arc;

use log::{debug, info, trace, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{
    rloc_address, Dataset, MeshError, MeshLocalPrefix, MeshRole, MeshStack, OnMeshPrefix,
    SocketId, REALM_LOCAL_ALL_NODES,
};
use crate::logutil::escape_payload;

/// Receive buffer for host sockets (IPv6 minimum MTU).
const HOST_RECV_BUF: usize = 1280;

/// Index of a network interface, read from `/sys/class/net/<name>/ifindex`.
pub fn interface_index(name: &str) -> std::io::Result<u32> {
    let raw = std::fs::read_to_string(format!("/sys/class/net/{}/ifindex", name))?;
    raw.trim()
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Non-blocking IPv6 UDP socket bound to `[::]:port`. With a non-zero interface index,
/// multicast (`ff03::1` has no scope id of its own) leaves through that interface.
fn host_socket(port: u16, interface_index: u32) -> std::io::Result<StdUdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    if interface_index != 0 {
        socket.set_multicast_if_v6(interface_index)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&SockAddr::from(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0)))?;
    Ok(socket.into())
}

/// Datagram read from a bound host socket.
#[derive(Debug, Clone)]
pub struct InboundDatagram {
    pub local_port: u16,
    pub payload: Vec<u8>,
    pub sender: SocketAddrV6,
}

/// Static view of the mesh, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct MeshView {
    pub role: MeshRole,
    pub mesh_local_prefix: Option<MeshLocalPrefix>,
    pub network_data: Vec<OnMeshPrefix>,
    pub leader_rloc16: Option<u16>,
    pub own_rloc16: u16,
    /// Interface index used as scope id and for multicast membership.
    pub interface_index: u32,
}

enum HostSocket {
    /// Opened, not bound; the OS socket is created on first send.
    Unbound(Option<StdUdpSocket>),
    Bound {
        port: u16,
        socket: Arc<UdpSocket>,
        reader: JoinHandle<()>,
    },
}

pub struct HostMesh {
    view: MeshView,
    dataset: Option<Dataset>,
    sockets: HashMap<SocketId, HostSocket>,
    next_socket: u32,
    inbound_tx: mpsc::UnboundedSender<InboundDatagram>,
}

impl HostMesh {
    pub fn new(view: MeshView, inbound_tx: mpsc::UnboundedSender<InboundDatagram>) -> Self {
        Self {
            view,
            dataset: None,
            sockets: HashMap::new(),
            next_socket: 0,
            inbound_tx,
        }
    }

    pub fn view(&self) -> &MeshView {
        &self.view
    }

    /// Role changes arrive from outside (console, supervisor); the runtime calls this
    /// before delivering the matching `RoleChanged` event.
    pub fn set_role(&mut self, role: MeshRole) {
        self.view.role = role;
    }

    fn bind_os_socket(&self, port: u16) -> Result<Arc<UdpSocket>, MeshError> {
        // Reader tasks and reactor registration need a runtime.
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(MeshError::InvalidState);
        }
        let std_socket = host_socket(port, self.view.interface_index)?;
        if let Err(e) = std_socket.join_multicast_v6(&REALM_LOCAL_ALL_NODES, self.view.interface_index) {
            debug!("Port {} did not join {}: {}", port, REALM_LOCAL_ALL_NODES, e);
        }
        Ok(Arc::new(UdpSocket::from_std(std_socket)?))
    }

    fn spawn_reader(&self, port: u16, socket: Arc<UdpSocket>) -> JoinHandle<()> {
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; HOST_RECV_BUF];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        let sender = match from {
                            SocketAddr::V6(v6) => v6,
                            SocketAddr::V4(v4) => {
                                SocketAddrV6::new(v4.ip().to_ipv6_mapped(), v4.port(), 0, 0)
                            }
                        };
                        trace!("port {} <- {} '{}'", port, sender, escape_payload(&buf[..len]));
                        let datagram = InboundDatagram {
                            local_port: port,
                            payload: buf[..len].to_vec(),
                            sender,
                        };
                        if tx.send(datagram).is_err() {
                            debug!("Inbound channel closed; reader for port {} exiting", port);
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Receive error on port {}: {}", port, e);
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        })
    }
}

impl MeshStack for HostMesh {
    fn role(&self) -> MeshRole {
        self.view.role
    }

    fn mesh_local_prefix(&self) -> Option<MeshLocalPrefix> {
        self.view.mesh_local_prefix
    }

    fn on_mesh_prefixes(&self) -> Vec<OnMeshPrefix> {
        self.view.network_data.clone()
    }

    fn leader_rloc(&self) -> Result<Ipv6Addr, MeshError> {
        match (self.view.mesh_local_prefix, self.view.leader_rloc16) {
            (Some(prefix), Some(rloc16)) => Ok(rloc_address(prefix, rloc16)),
            _ => Err(MeshError::InvalidState),
        }
    }

    fn udp_open(&mut self) -> Result<SocketId, MeshError> {
        self.next_socket = self.next_socket.wrapping_add(1);
        let id = SocketId(self.next_socket);
        self.sockets.insert(id, HostSocket::Unbound(None));
        Ok(id)
    }

    fn udp_bind(&mut self, socket: SocketId, port: u16) -> Result<(), MeshError> {
        match self.sockets.get(&socket) {
            None => return Err(MeshError::UnknownSocket(socket)),
            Some(HostSocket::Bound { .. }) => return Err(MeshError::Already),
            Some(HostSocket::Unbound(_)) => {}
        }
        let os_socket = self.bind_os_socket(port)?;
        let reader = self.spawn_reader(port, os_socket.clone());
        self.sockets.insert(
            socket,
            HostSocket::Bound {
                port,
                socket: os_socket,
                reader,
            },
        );
        info!("Host socket {:?} bound to [::]:{}", socket, port);
        Ok(())
    }

    fn udp_send(
        &mut self,
        socket: SocketId,
        dest: &SocketAddrV6,
        payload: &[u8],
    ) -> Result<(), MeshError> {
        let mut target = *dest;
        if target.scope_id() == 0 {
            target.set_scope_id(self.view.interface_index);
        }
        match self.sockets.get_mut(&socket) {
            None => Err(MeshError::UnknownSocket(socket)),
            Some(HostSocket::Bound { socket, .. }) => {
                socket.try_send_to(payload, SocketAddr::V6(target))?;
                Ok(())
            }
            Some(HostSocket::Unbound(slot)) => {
                if slot.is_none() {
                    *slot = Some(host_socket(0, self.view.interface_index)?);
                }
                match slot {
                    Some(s) => {
                        s.send_to(payload, target)?;
                        Ok(())
                    }
                    None => Err(MeshError::InvalidState),
                }
            }
        }
    }

    fn udp_close(&mut self, socket: SocketId) {
        if let Some(HostSocket::Bound { port, reader, .. }) = self.sockets.remove(&socket) {
            reader.abort();
            debug!("Host socket {:?} on port {} closed", socket, port);
        }
    }

    fn has_active_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    fn set_active_dataset(&mut self, dataset: &Dataset) -> Result<(), MeshError> {
        info!(
            "Recorded dataset '{}' pan 0x{:04x} channel {} (apply it on the Thread interface owner)",
            dataset.network_name, dataset.pan_id, dataset.channel
        );
        self.dataset = Some(dataset.clone());
        Ok(())
    }

    fn add_on_mesh_prefix(&mut self, prefix: &OnMeshPrefix) -> Result<(), MeshError> {
        let own = self.view.own_rloc16;
        if self
            .view
            .network_data
            .iter()
            .any(|p| p.prefix == prefix.prefix && p.length == prefix.length && p.rloc16 == own)
        {
            return Err(MeshError::Already);
        }
        let mut entry = prefix.clone();
        entry.rloc16 = own;
        self.view.network_data.push(entry);
        Ok(())
    }
}

impl Drop for HostMesh {
    fn drop(&mut self) {
        for (_, s) in self.sockets.drain() {
            if let HostSocket::Bound { reader, .. } = s {
                reader.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_outside_runtime_is_invalid_state() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut mesh = HostMesh::new(MeshView::default(), tx);
        let id = mesh.udp_open().unwrap();
        assert!(matches!(mesh.udp_bind(id, 0), Err(MeshError::InvalidState)));
    }

    #[test]
    fn multicast_interface_follows_configured_index() {
        // Skip on hosts without IPv6 or a loopback interface index.
        let Ok(lo) = interface_index("lo") else { return };
        let Ok(sock) = host_socket(0, lo) else { return };
        let sock = Socket::from(sock);
        assert_eq!(sock.multicast_if_v6().unwrap(), lo);

        let Ok(plain) = host_socket(0, 0) else { return };
        assert_eq!(Socket::from(plain).multicast_if_v6().unwrap(), 0);
    }

    #[tokio::test]
    async fn loopback_roundtrip_through_reader() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mesh = HostMesh::new(MeshView::default(), tx);
        let listener = mesh.udp_open().unwrap();
        // Pick a free port first; skip on hosts without IPv6 loopback.
        let probe = match StdUdpSocket::bind("[::1]:0") {
            Ok(s) => s,
            Err(_) => return,
        };
        let port = probe.local_addr().unwrap().port();
        drop(probe);
        mesh.udp_bind(listener, port).unwrap();

        let sender = mesh.udp_open().unwrap();
        let dest = SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0);
        mesh.udp_send(sender, &dest, b"start").unwrap();
        mesh.udp_close(sender);

        let got = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timeout")
            .expect("closed");
        assert_eq!(got.local_port, port);
        assert_eq!(got.payload, b"start");
        mesh.udp_close(listener);
    }
}
