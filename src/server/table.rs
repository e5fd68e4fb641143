//! Fixed-size connection table.

use crate::net::connection::Connection;
use crate::tls::{SecureSession, TlsError};

/// Slots for live connections, indexed the way the serve loop addresses them.
pub struct ConnectionTable<S: SecureSession> {
    slots: Vec<Option<Connection<S>>>,
}

impl<S: SecureSession> ConnectionTable<S> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lowest free slot index.
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    /// Store `connection` at `slot`. The slot must exist and be empty.
    pub fn insert(
        &mut self,
        slot: usize,
        connection: Connection<S>,
    ) -> Result<&mut Connection<S>, TlsError> {
        match self.slots.get_mut(slot) {
            None => Err(TlsError::InvalidState("connection slot out of range")),
            Some(Some(_)) => Err(TlsError::InvalidState("connection slot occupied")),
            Some(entry) => Ok(entry.insert(connection)),
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Connection<S>> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Empty `slot`, handing its connection back (dropping it runs teardown).
    pub fn remove(&mut self, slot: usize) -> Option<Connection<S>> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Connection<S>)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_mut().map(|conn| (slot, conn)))
    }

    /// Free every slot whose connection reached `Closed`. Returns how many.
    pub fn reap_closed(&mut self) -> usize {
        let mut reaped = 0;
        for entry in &mut self.slots {
            if entry.as_ref().is_some_and(Connection::is_closed) {
                *entry = None;
                reaped += 1;
            }
        }
        reaped
    }
}
