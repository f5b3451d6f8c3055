use super::registry::{PollEntry, ReadySets};

use crate::error::{Error, Result, SysError};
use crate::events::{Event, PollEvents};
use crate::sys::RawSocket;

use std::collections::BTreeMap;
use std::io;

/// Resolves the post-`select` sets into a single event.
///
/// Entries are scanned in handle order and the first one marked ready in any
/// set is reported; later ready sockets are picked up by subsequent waits.
/// `socket_error` reads the socket's pending error (`0` for none).
///
/// Sockets that were removed while the wait was blocked are simply absent
/// from `entries` and never reported. An entry whose only readiness is in a
/// class it no longer watches is skipped. If nothing is left to report the
/// pass ends with [`Error::TimedOut`].
pub(crate) fn decode<T, F>(
    entries: &BTreeMap<RawSocket, PollEntry<T>>,
    ready: &ReadySets,
    mut socket_error: F,
) -> Result<Event<T>>
where
    T: Clone,
    F: FnMut(RawSocket) -> io::Result<i32>,
{
    for (&sock, entry) in entries {
        if !ready.contains(sock) {
            continue;
        }

        let mut events = PollEvents::empty();
        let mut err = None;

        match socket_error(sock) {
            Ok(0) => {}
            Ok(code) => {
                events |= PollEvents::ERR;
                err = Some(SysError::from_raw_os_error(code));
            }
            Err(e) => {
                warn!("pending error query failed for socket {sock:?}: {e}");
                return Err(e.into());
            }
        }

        events |= resolve(sock, entry.events, ready);

        if events.is_empty() {
            trace!("socket {sock:?} ready only for unwatched events, skipping");
            continue;
        }

        return Ok(Event {
            socket: sock,
            events,
            err,
            user_data: entry.user_data.clone(),
        });
    }

    warn!("wait returned readiness only for sockets no longer watched");
    Err(Error::TimedOut)
}

/// Maps native-class membership to the portable events the entry watches.
fn resolve(sock: RawSocket, watched: PollEvents, ready: &ReadySets) -> PollEvents {
    let mut events = PollEvents::empty();

    if ready.read.contains(sock) && watched.contains(PollEvents::IN) {
        events |= PollEvents::IN;
    }

    if ready.write.contains(sock) {
        if watched.contains(PollEvents::CONNECT) {
            events |= PollEvents::CONNECT;
        } else if watched.contains(PollEvents::OUT) {
            events |= PollEvents::OUT;
        }
    }

    if ready.except.contains(sock) {
        if watched.contains(PollEvents::CONNECT) {
            events |= PollEvents::CONNECT;
        } else if watched.contains(PollEvents::OOB) {
            events |= PollEvents::OOB;
        }
    }

    events
}
