use crate::error::{Error, Result};
use crate::events::PollEvents;
use crate::sys::{self, FdSet, INVALID_SOCKET, RawSocket};

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A socket registered for polling.
pub(crate) struct PollEntry<T> {
    pub(crate) events: PollEvents,
    pub(crate) user_data: T,
}

/// The three native readiness sets `select` operates on.
#[derive(Clone, Copy)]
pub(crate) struct ReadySets {
    pub(crate) read: FdSet,
    pub(crate) write: FdSet,
    pub(crate) except: FdSet,
}

impl ReadySets {
    pub(crate) fn new() -> Self {
        Self {
            read: FdSet::new(),
            write: FdSet::new(),
            except: FdSet::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty() && self.except.is_empty()
    }

    /// Returns `true` if `sock` is a member of any of the three sets.
    pub(crate) fn contains(&self, sock: RawSocket) -> bool {
        self.read.contains(sock) || self.write.contains(sock) || self.except.contains(sock)
    }

    /// Mirrors a watch mask into the native classes.
    ///
    /// `CONNECT` lands in both the write and except classes: a completed
    /// connect is reported as writable, a failed one may only surface as an
    /// exceptional condition.
    fn set(&mut self, sock: RawSocket, events: PollEvents) {
        if events.contains(PollEvents::IN) {
            self.read.insert(sock);
        }
        if events.intersects(PollEvents::OUT | PollEvents::CONNECT) {
            self.write.insert(sock);
        }
        if events.intersects(PollEvents::OOB | PollEvents::CONNECT) {
            self.except.insert(sock);
        }
    }

    fn clear(&mut self, sock: RawSocket) {
        self.read.remove(sock);
        self.write.remove(sock);
        self.except.remove(sock);
    }
}

/// A copy of the readiness mirrors taken under the lock, ready to be handed to `select`.
pub(crate) struct Snapshot {
    pub(crate) sets: ReadySets,
    pub(crate) highest: RawSocket,
}

/// Watched sockets ordered by handle, with their native readiness mirrors.
///
/// Every mutation updates the map and the mirrors together, so a caller
/// holding the context lock always observes them in agreement.
pub(crate) struct Registry<T> {
    entries: BTreeMap<RawSocket, PollEntry<T>>,
    sets: ReadySets,
    capacity: usize,
}

impl<T> Registry<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            sets: ReadySets::new(),
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn entries(&self) -> &BTreeMap<RawSocket, PollEntry<T>> {
        &self.entries
    }

    pub(crate) fn add(&mut self, sock: RawSocket, events: PollEvents, user_data: T) -> Result<()> {
        validate(sock, events)?;

        if self.entries.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        match self.entries.entry(sock) {
            Entry::Occupied(_) => Err(Error::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(PollEntry { events, user_data });
                self.sets.set(sock, events);
                Ok(())
            }
        }
    }

    pub(crate) fn modify(
        &mut self,
        sock: RawSocket,
        events: PollEvents,
        user_data: T,
    ) -> Result<()> {
        validate(sock, events)?;

        let entry = self.entries.get_mut(&sock).ok_or(Error::NotFound)?;
        entry.events = events;
        entry.user_data = user_data;

        self.sets.clear(sock);
        self.sets.set(sock, events);
        Ok(())
    }

    /// Removes `sock`, returning `true` if it was registered.
    pub(crate) fn remove(&mut self, sock: RawSocket) -> bool {
        if self.entries.remove(&sock).is_some() {
            self.sets.clear(sock);
            true
        } else {
            false
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.sets = ReadySets::new();
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            sets: self.sets,
            highest: self
                .entries
                .last_key_value()
                .map_or(INVALID_SOCKET, |(&sock, _)| sock),
        }
    }
}

fn validate(sock: RawSocket, events: PollEvents) -> Result<()> {
    if sock == INVALID_SOCKET || !sys::representable(sock) || !events.is_valid_input() {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_mirrors_events_into_native_classes() {
        let mut reg = Registry::new(8);
        reg.add(3, PollEvents::IN, ()).unwrap();
        reg.add(4, PollEvents::OUT, ()).unwrap();
        reg.add(5, PollEvents::OOB, ()).unwrap();
        reg.add(6, PollEvents::CONNECT, ()).unwrap();

        let snap = reg.snapshot();
        assert!(snap.sets.read.contains(3));
        assert!(snap.sets.write.contains(4));
        assert!(snap.sets.except.contains(5));
        assert!(snap.sets.write.contains(6));
        assert!(snap.sets.except.contains(6));
        assert!(!snap.sets.read.contains(6));
        assert_eq!(snap.highest, 6);
        assert_eq!(
            (snap.sets.read.len(), snap.sets.write.len(), snap.sets.except.len()),
            (1, 2, 2)
        );
    }

    #[test]
    fn rejects_invalid_input() {
        let mut reg = Registry::new(8);
        assert_eq!(reg.add(INVALID_SOCKET, PollEvents::IN, ()), Err(Error::InvalidArgument));
        assert_eq!(reg.add(3, PollEvents::empty(), ()), Err(Error::InvalidArgument));
        assert_eq!(reg.add(3, PollEvents::ERR, ()), Err(Error::InvalidArgument));
        assert_eq!(reg.len(), 0);
        assert!(reg.snapshot().sets.is_empty());
    }

    #[test]
    fn duplicate_add_keeps_original_entry() {
        let mut reg = Registry::new(8);
        reg.add(3, PollEvents::IN, 1).unwrap();

        assert_eq!(reg.add(3, PollEvents::OUT, 2), Err(Error::AlreadyExists));

        let entry = &reg.entries()[&3];
        assert_eq!(entry.events, PollEvents::IN);
        assert_eq!(entry.user_data, 1);
        assert!(!reg.snapshot().sets.write.contains(3));
    }

    #[test]
    fn full_registry_is_left_unchanged() {
        let mut reg = Registry::new(2);
        reg.add(3, PollEvents::IN, ()).unwrap();
        reg.add(4, PollEvents::IN, ()).unwrap();

        assert_eq!(
            reg.add(5, PollEvents::IN, ()),
            Err(Error::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(reg.len(), 2);
        assert!(!reg.snapshot().sets.read.contains(5));

        reg.remove(3);
        reg.add(5, PollEvents::IN, ()).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn modify_replaces_mirrors() {
        let mut reg = Registry::new(8);
        reg.add(3, PollEvents::IN | PollEvents::OOB, 'a').unwrap();
        reg.modify(3, PollEvents::OUT, 'b').unwrap();

        let snap = reg.snapshot();
        assert!(!snap.sets.read.contains(3));
        assert!(!snap.sets.except.contains(3));
        assert!(snap.sets.write.contains(3));
        assert_eq!(reg.entries()[&3].user_data, 'b');

        assert_eq!(reg.modify(9, PollEvents::IN, 'c'), Err(Error::NotFound));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut reg = Registry::new(8);
        reg.add(3, PollEvents::CONNECT, ()).unwrap();

        assert!(reg.remove(3));
        assert!(!reg.remove(3));
        assert!(!reg.remove(INVALID_SOCKET));
        assert!(reg.snapshot().sets.is_empty());
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut reg = Registry::new(4);

        for round in 0..50 {
            let sock = (round * 7 % 11 + 1) as RawSocket;
            match round % 3 {
                0 | 1 => {
                    let _ = reg.add(sock, PollEvents::IN, round);
                }
                _ => {
                    reg.remove(sock);
                }
            }
            assert!(reg.len() <= reg.capacity());
            assert_eq!(reg.snapshot().sets.read.len(), reg.len());
        }
    }
}
