//! In-process mock communicator: simulates a rank group over shared memory
//! instead of a real transport, for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use bytes::Bytes;

use super::{ANY_SOURCE, ANY_TAG, Communicator, Request};
use crate::error::{IcetError, Result};

struct Message {
	source: i32,
	tag: i32,
	data: Bytes,
}

struct PendingRecv {
	request: Request,
	source: i32,
	tag: i32,
}

#[derive(Default)]
struct RankState {
	inbox: VecDeque<Message>,
	pending_recvs: Vec<PendingRecv>,
	completed: HashMap<Request, Option<Bytes>>,
}

struct Slot {
	state: Mutex<RankState>,
	ready: Condvar,
}

struct MockGroup {
	ranks: Vec<Slot>,
	next_request: AtomicU64,
}

impl MockGroup {
	fn new(size: i32) -> Arc<Self> {
		let ranks = (0..size)
			.map(|_| Slot {
				state: Mutex::new(RankState::default()),
				ready: Condvar::new(),
			})
			.collect();
		Arc::new(Self {
			ranks,
			next_request: AtomicU64::new(1),
		})
	}

	fn next_request(&self) -> Request {
		Request(self.next_request.fetch_add(1, Ordering::Relaxed))
	}

	/// Delivers a message to `dest`'s inbox, or directly into a matching
	/// already-posted pending receive's completed slot.
	fn deliver(&self, dest: i32, source: i32, tag: i32, data: Bytes) {
		let slot = &self.ranks[dest as usize];
		let mut state = slot.state.lock().expect("mock communicator mutex poisoned");
		if let Some(pos) = state
			.pending_recvs
			.iter()
			.position(|p| (p.source == ANY_SOURCE || p.source == source) && (p.tag == ANY_TAG || p.tag == tag))
		{
			let pending = state.pending_recvs.remove(pos);
			state.completed.insert(pending.request, Some(data));
		} else {
			state.inbox.push_back(Message {
				source,
				tag,
				data,
			});
		}
		slot.ready.notify_all();
	}

	fn take_matching(state: &mut RankState, source: i32, tag: i32) -> Option<Bytes> {
		let pos = state
			.inbox
			.iter()
			.position(|m| (source == ANY_SOURCE || m.source == source) && (tag == ANY_TAG || m.tag == tag))?;
		Some(state.inbox.remove(pos).expect("position was just found").data)
	}
}

/// An in-process `Communicator` over a fixed set of simulated ranks, backed
/// by per-rank inboxes guarded by a mutex and condition variable.
pub struct MockCommunicator {
	group: Arc<MockGroup>,
	my_rank: i32,
}

impl std::fmt::Debug for MockCommunicator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MockCommunicator")
			.field("rank", &self.my_rank)
			.field("size", &self.group.ranks.len())
			.finish()
	}
}

impl MockCommunicator {
	/// Builds a full group of `size` mock communicators, one per rank, all
	/// sharing the same in-process transport.
	pub fn group(size: i32) -> Vec<Self> {
		let group = MockGroup::new(size);
		(0..size)
			.map(|rank| Self {
				group: Arc::clone(&group),
				my_rank: rank,
			})
			.collect()
	}
}

impl Communicator for MockCommunicator {
	fn duplicate(&self) -> Result<Box<dyn Communicator>> {
		Ok(Box::new(Self {
			group: Arc::clone(&self.group),
			my_rank: self.my_rank,
		}))
	}

	fn size(&self) -> i32 {
		self.group.ranks.len() as i32
	}

	fn rank(&self) -> i32 {
		self.my_rank
	}

	fn send(&self, dest: i32, tag: i32, data: Bytes) -> Result<()> {
		super::validate_rank(dest, self.size())?;
		self.group.deliver(dest, self.my_rank, tag, data);
		Ok(())
	}

	fn recv(&self, source: i32, tag: i32) -> Result<Bytes> {
		if source != ANY_SOURCE {
			super::validate_rank(source, self.size())?;
		}
		let slot = &self.group.ranks[self.my_rank as usize];
		let mut state = slot.state.lock().expect("mock communicator mutex poisoned");
		loop {
			if let Some(data) = MockGroup::take_matching(&mut state, source, tag) {
				return Ok(data);
			}
			state = slot.ready.wait(state).expect("mock communicator mutex poisoned");
		}
	}

	fn isend(&self, dest: i32, tag: i32, data: Bytes) -> Result<Request> {
		super::validate_rank(dest, self.size())?;
		let request = self.group.next_request();
		self.group.deliver(dest, self.my_rank, tag, data);
		let slot = &self.group.ranks[self.my_rank as usize];
		let mut state = slot.state.lock().expect("mock communicator mutex poisoned");
		state.completed.insert(request, None);
		Ok(request)
	}

	fn irecv(&self, source: i32, tag: i32) -> Result<Request> {
		if source != ANY_SOURCE {
			super::validate_rank(source, self.size())?;
		}
		let request = self.group.next_request();
		let slot = &self.group.ranks[self.my_rank as usize];
		let mut state = slot.state.lock().expect("mock communicator mutex poisoned");
		if let Some(data) = MockGroup::take_matching(&mut state, source, tag) {
			state.completed.insert(request, Some(data));
		} else {
			state.pending_recvs.push(PendingRecv {
				request,
				source,
				tag,
			});
		}
		Ok(request)
	}

	fn waitany(&self, requests: &[Request]) -> Result<(usize, Option<Bytes>)> {
		if requests.is_empty() {
			return Err(IcetError::InvalidValue("waitany called with no requests".into()));
		}
		let slot = &self.group.ranks[self.my_rank as usize];
		let mut state = slot.state.lock().expect("mock communicator mutex poisoned");
		loop {
			if let Some((index, request)) = requests.iter().enumerate().find(|(_, r)| state.completed.contains_key(r))
			{
				let payload = state.completed.remove(&request).flatten();
				return Ok((index, payload));
			}
			state = slot.ready.wait(state).expect("mock communicator mutex poisoned");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn send_recv_round_trip_between_two_ranks() {
		let mut ranks = MockCommunicator::group(2);
		let r1 = ranks.pop().unwrap();
		let r0 = ranks.pop().unwrap();

		r0.send(1, 7, Bytes::from_static(b"hello")).unwrap();
		let received = r1.recv(0, 7).unwrap();
		assert_eq!(received, Bytes::from_static(b"hello"));
	}

	#[test]
	fn recv_any_source_matches_first_sender() {
		let ranks = MockCommunicator::group(3);
		ranks[2].send(0, 1, Bytes::from_static(b"from-2")).unwrap();
		let received = ranks[0].recv(ANY_SOURCE, ANY_TAG).unwrap();
		assert_eq!(received, Bytes::from_static(b"from-2"));
	}

	#[test]
	fn waitany_resolves_an_already_completed_send() {
		let ranks = MockCommunicator::group(2);
		let req = ranks[0].isend(1, 0, Bytes::from_static(b"x")).unwrap();
		let (index, payload) = ranks[0].waitany(&[req]).unwrap();
		assert_eq!(index, 0);
		assert!(payload.is_none());
	}

	#[test]
	fn irecv_posted_before_send_completes_once_send_arrives() {
		let ranks = MockCommunicator::group(2);
		let req = ranks[1].irecv(0, 5).unwrap();
		ranks[0].send(1, 5, Bytes::from_static(b"late")).unwrap();
		let (index, payload) = ranks[1].waitany(&[req]).unwrap();
		assert_eq!(index, 0);
		assert_eq!(payload, Some(Bytes::from_static(b"late")));
	}

	#[test]
	fn rejects_out_of_range_destination() {
		let ranks = MockCommunicator::group(2);
		assert!(ranks[0].send(5, 0, Bytes::new()).is_err());
	}
}
