//! In-memory mesh stack.
//!
//! `SimMesh` keeps the mesh view (role, mesh-local prefix, network data) as plain
//! fields and records every socket operation, so tests and the `simulate` command
//! can drive a node deterministically and inspect exactly what it put on the air.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{Ipv6Addr, SocketAddrV6};

use super::{
    rloc_address, Dataset, MeshError, MeshLocalPrefix, MeshRole, MeshStack, OnMeshPrefix,
    SocketId,
};

/// One datagram handed to [`MeshStack::udp_send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub socket: SocketId,
    pub dest: SocketAddrV6,
    pub payload: Vec<u8>,
}

impl SentDatagram {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

#[derive(Debug, Default)]
pub struct SimMesh {
    pub role: MeshRole,
    pub mesh_local_prefix: Option<MeshLocalPrefix>,
    pub network_data: Vec<OnMeshPrefix>,
    pub leader_rloc16: Option<u16>,
    /// RLOC16 this node advertises published prefixes with.
    pub own_rloc16: u16,
    pub dataset: Option<Dataset>,
    /// Failure injection.
    pub fail_open: bool,
    pub fail_bind: bool,
    pub fail_send: bool,
    next_socket: u32,
    open: BTreeSet<SocketId>,
    bound: BTreeMap<SocketId, u16>,
    bind_calls: Vec<u16>,
    closed: Vec<SocketId>,
    sent: Vec<SentDatagram>,
}

impl SimMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// A formed network with the given mesh-local prefix and role.
    pub fn formed(prefix: Ipv6Addr, role: MeshRole) -> Self {
        Self {
            role,
            mesh_local_prefix: Some(super::prefix_of(&prefix)),
            ..Self::default()
        }
    }

    pub fn set_role(&mut self, role: MeshRole) {
        self.role = role;
    }

    pub fn push_prefix(&mut self, entry: OnMeshPrefix) {
        self.network_data.push(entry);
    }

    pub fn sent(&self) -> &[SentDatagram] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<SentDatagram> {
        std::mem::take(&mut self.sent)
    }

    /// Ports passed to every bind attempt, in call order (including failed ones).
    pub fn bind_calls(&self) -> &[u16] {
        &self.bind_calls
    }

    pub fn bind_count(&self, port: u16) -> usize {
        self.bind_calls.iter().filter(|p| **p == port).count()
    }

    pub fn is_port_bound(&self, port: u16) -> bool {
        self.bound.values().any(|p| *p == port)
    }

    pub fn open_socket_count(&self) -> usize {
        self.open.len()
    }

    pub fn closed_sockets(&self) -> &[SocketId] {
        &self.closed
    }
}

impl MeshStack for SimMesh {
    fn role(&self) -> MeshRole {
        self.role
    }

    fn mesh_local_prefix(&self) -> Option<MeshLocalPrefix> {
        self.mesh_local_prefix
    }

    fn on_mesh_prefixes(&self) -> Vec<OnMeshPrefix> {
        self.network_data.clone()
    }

    fn leader_rloc(&self) -> Result<Ipv6Addr, MeshError> {
        match (self.mesh_local_prefix, self.leader_rloc16) {
            (Some(prefix), Some(rloc16)) => Ok(rloc_address(prefix, rloc16)),
            _ => Err(MeshError::InvalidState),
        }
    }

    fn udp_open(&mut self) -> Result<SocketId, MeshError> {
        if self.fail_open {
            return Err(MeshError::NoBufs);
        }
        self.next_socket += 1;
        let id = SocketId(self.next_socket);
        self.open.insert(id);
        Ok(id)
    }

    fn udp_bind(&mut self, socket: SocketId, port: u16) -> Result<(), MeshError> {
        self.bind_calls.push(port);
        if !self.open.contains(&socket) {
            return Err(MeshError::UnknownSocket(socket));
        }
        if self.fail_bind {
            return Err(MeshError::InvalidState);
        }
        if self.is_port_bound(port) || self.bound.contains_key(&socket) {
            return Err(MeshError::Already);
        }
        self.bound.insert(socket, port);
        Ok(())
    }

    fn udp_send(
        &mut self,
        socket: SocketId,
        dest: &SocketAddrV6,
        payload: &[u8],
    ) -> Result<(), MeshError> {
        if !self.open.contains(&socket) {
            return Err(MeshError::UnknownSocket(socket));
        }
        if self.fail_send {
            return Err(MeshError::NoBufs);
        }
        self.sent.push(SentDatagram {
            socket,
            dest: *dest,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn udp_close(&mut self, socket: SocketId) {
        if self.open.remove(&socket) {
            self.bound.remove(&socket);
            self.closed.push(socket);
        }
    }

    fn has_active_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    fn set_active_dataset(&mut self, dataset: &Dataset) -> Result<(), MeshError> {
        self.dataset = Some(dataset.clone());
        Ok(())
    }

    fn add_on_mesh_prefix(&mut self, prefix: &OnMeshPrefix) -> Result<(), MeshError> {
        if self
            .network_data
            .iter()
            .any(|p| p.prefix == prefix.prefix && p.length == prefix.length && p.rloc16 == self.own_rloc16)
        {
            return Err(MeshError::Already);
        }
        let mut entry = prefix.clone();
        entry.rloc16 = self.own_rloc16;
        self.network_data.push(entry);
        Ok(())
    }
}
