//! Test doubles shared by the unit tests.

use crate::sync::{SyncError, SyncResult, Transport, TransportEvent};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use url::Url;

#[derive(Default)]
struct LoopbackState {
    incoming: VecDeque<TransportEvent>,
    sent: Vec<String>,
    opened: usize,
    closes: Vec<u16>,
    refuse_open: bool,
}

/// In-memory transport. Clones share state, so a test keeps one handle to
/// script inbound events and inspect outbound frames.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    state: Rc<RefCell<LoopbackState>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound event.
    pub fn push(&self, event: TransportEvent) {
        self.state.borrow_mut().incoming.push_back(event);
    }

    /// Queue an inbound text frame.
    pub fn push_text(&self, text: &str) {
        self.push(TransportEvent::Message(text.to_string()));
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.borrow().sent.clone()
    }

    pub fn clear_sent(&self) {
        self.state.borrow_mut().sent.clear();
    }

    pub fn open_count(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn close_codes(&self) -> Vec<u16> {
        self.state.borrow().closes.clone()
    }

    pub fn set_refuse_open(&self, refuse: bool) {
        self.state.borrow_mut().refuse_open = refuse;
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, _url: &Url) -> SyncResult<()> {
        let mut state = self.state.borrow_mut();
        if state.refuse_open {
            return Err(SyncError::SendFailed("open refused".into()));
        }
        state.opened += 1;
        Ok(())
    }

    fn send(&mut self, text: &str) -> SyncResult<()> {
        self.state.borrow_mut().sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self, code: u16, reason: &str) {
        let mut state = self.state.borrow_mut();
        state.closes.push(code);
        state.incoming.push_back(TransportEvent::Closed {
            code,
            reason: reason.to_string(),
        });
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        self.state.borrow_mut().incoming.drain(..).collect()
    }
}

/// Simple blocking executor for tests
pub fn block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
