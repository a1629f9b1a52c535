//! Session coordination for one board.
//!
//! The coordinator owns the materialized log, the local edit buffer and the
//! presence set, and is the only place where they change. It is driven by the
//! host loop: user actions call [`SessionCoordinator::submit_local`],
//! [`SessionCoordinator::undo`] and friends, and [`SessionCoordinator::poll`]
//! applies whatever the sync channel received.
//!
//! Undo is local only. An undone operation stays in the shared log and is
//! merely hidden from this client's view; the next full `sync` from the server
//! is authoritative and makes it visible again.

use crate::channel::{ChannelEvent, ChannelState, SyncChannel};
use crate::config::{ClientConfig, ConfigError};
use crate::edit_buffer::EditBuffer;
use crate::operation::{Operation, OperationFactory, OperationId};
use crate::oplog::OperationLog;
use crate::presence::{ActiveUser, CursorPosition, PresenceSet};
use crate::storage::{ApiError, BoardApi, BoardSnapshot, HttpBoardApi};
use crate::sync::{NativeWebSocket, ServerMessage, SyncError, Transport, board_socket_url};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Receives the list of operations to draw whenever the view changes.
pub trait Repaint {
    fn repaint(&mut self, operations: &[&Operation]);
}

/// Headless sessions don't draw.
impl Repaint for () {
    fn repaint(&mut self, _operations: &[&Operation]) {}
}

/// User-visible notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Connected,
    Disconnected { code: u16, reconnecting: bool },
    UserJoined(ActiveUser),
    UserLeft(ActiveUser),
    /// The board could not be loaded; the session keeps working locally.
    SnapshotFailed(String),
    /// Neither the channel nor the HTTP fallback accepted an operation.
    SendFailed { operation: OperationId, reason: String },
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Storage error: {0}")]
    Api(#[from] ApiError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Operation {operation} was not delivered: {reason}")]
    Undelivered { operation: OperationId, reason: String },
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Coordinates the remote log, local edits and presence for one board.
pub struct SessionCoordinator<T: Transport, A: BoardApi, R: Repaint> {
    board_id: String,
    channel: SyncChannel<T>,
    api: Arc<A>,
    view: R,
    /// Materialized log: server order plus optimistic local appends.
    log: OperationLog,
    buffer: EditBuffer,
    presence: PresenceSet,
    factory: OperationFactory,
    /// Snapshot metadata (operations moved into `log`).
    board: Option<BoardSnapshot>,
    /// Operations no delivery path accepted yet; resent on the next open.
    pending: Vec<Operation>,
    loading: bool,
    notices: Vec<SessionNotice>,
}

impl<R: Repaint> SessionCoordinator<NativeWebSocket, HttpBoardApi, R> {
    /// Build a session talking to real services, as described by `config`.
    pub fn from_config(config: &ClientConfig, board_id: &str, view: R) -> SessionResult<Self> {
        config.validate()?;
        let url = board_socket_url(
            &config.server_url,
            board_id,
            &config.user_id,
            &config.email,
            config.token.as_deref(),
        )?;
        let channel = SyncChannel::new(NativeWebSocket::new(), url).with_reconnect_delay(config.reconnect_delay());
        let api = HttpBoardApi::new(&config.api_url, config.token.clone())?;
        let factory = OperationFactory::new(Some(config.user_id.clone()));

        Ok(Self::new(board_id, channel, Arc::new(api), view, factory).with_history_limit(config.history_limit))
    }
}

impl<T: Transport, A: BoardApi, R: Repaint> SessionCoordinator<T, A, R> {
    pub fn new(board_id: &str, channel: SyncChannel<T>, api: Arc<A>, view: R, factory: OperationFactory) -> Self {
        Self {
            board_id: board_id.to_string(),
            channel,
            api,
            view,
            log: OperationLog::new(),
            buffer: EditBuffer::default(),
            presence: PresenceSet::new(),
            factory,
            board: None,
            pending: Vec::new(),
            loading: false,
            notices: Vec::new(),
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.buffer = EditBuffer::new(limit);
        self
    }

    // --- Accessors ---

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Snapshot metadata, once loaded.
    pub fn board(&self) -> Option<&BoardSnapshot> {
        self.board.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn edit_buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    pub fn presence(&self) -> &PresenceSet {
        &self.presence
    }

    pub fn factory(&self) -> &OperationFactory {
        &self.factory
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn channel(&self) -> &SyncChannel<T> {
        &self.channel
    }

    pub fn view(&self) -> &R {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut R {
        &mut self.view
    }

    /// Operations waiting for a working delivery path.
    pub fn pending(&self) -> &[Operation] {
        &self.pending
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> Vec<SessionNotice> {
        std::mem::take(&mut self.notices)
    }

    /// The log as this client should draw it: locally undone ops hidden.
    pub fn visible_operations(&self) -> Vec<&Operation> {
        visible_operations(&self.log, &self.buffer)
    }

    // --- Lifecycle ---

    /// Open the sync channel.
    pub fn connect(&mut self) -> SessionResult<()> {
        self.channel.connect()?;
        Ok(())
    }

    /// Close the channel for good (no reconnect).
    pub fn shutdown(&mut self) {
        log::info!("Shutting down session for board {}", self.board_id);
        self.channel.close();
    }

    /// Fetch the persisted board and seed the log with it.
    ///
    /// Operations already present (a `sync` that raced ahead, or local edits
    /// made while loading) are kept after the persisted ones. On failure the
    /// session stays usable with whatever it has.
    pub async fn load_initial(&mut self) -> SessionResult<()> {
        self.loading = true;
        let api = Arc::clone(&self.api);
        let result = api.fetch_board(&self.board_id).await;
        self.loading = false;

        match result {
            Ok(mut snapshot) => {
                let persisted = std::mem::take(&mut snapshot.canvas_operations);
                log::info!(
                    "Loaded board {} \"{}\" with {} operations",
                    snapshot.id,
                    snapshot.title,
                    persisted.len()
                );
                let mut seeded = OperationLog::from_operations(persisted);
                for operation in self.log.iter() {
                    seeded.append(operation.clone());
                }
                self.log = seeded;
                self.board = Some(snapshot);
                self.repaint();
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to load board {}: {}", self.board_id, e);
                self.notices.push(SessionNotice::SnapshotFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Drive the channel and apply everything it delivered.
    /// Returns the number of channel events processed.
    pub fn poll(&mut self, now: Instant) -> usize {
        let events = self.channel.poll(now);
        let count = events.len();
        for event in events {
            match event {
                ChannelEvent::Opened => {
                    self.notices.push(SessionNotice::Connected);
                    self.flush_pending();
                }
                ChannelEvent::Message(message) => self.apply_incoming(message),
                ChannelEvent::Closed { code, reconnect_at } => {
                    self.notices.push(SessionNotice::Disconnected {
                        code,
                        reconnecting: reconnect_at.is_some(),
                    });
                }
                ChannelEvent::Reconnecting => {
                    log::info!("Reconnecting to board {}", self.board_id);
                }
                ChannelEvent::Error(message) => {
                    log::warn!("Channel error on board {}: {}", self.board_id, message);
                }
            }
        }
        count
    }

    // --- Inbound ---

    /// Apply one server message.
    pub fn apply_incoming(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Operation { operation } => {
                let id = operation.id.clone();
                if self.log.append(operation) {
                    self.repaint();
                } else {
                    log::debug!("Ignoring echo of known operation {}", id);
                }
            }
            ServerMessage::Sync { operations } => {
                log::info!("Full sync: {} operations", operations.len());
                self.log.replace(operations);
                // The authoritative log wins over local undo.
                let visible_again: Vec<OperationId> = self
                    .buffer
                    .undone_ids()
                    .filter(|id| self.log.contains(id))
                    .cloned()
                    .collect();
                self.buffer.forget(visible_again.iter());
                self.repaint();
            }
            ServerMessage::UserJoined { user } => {
                if self.presence.join(user.clone()) {
                    log::info!("{} joined the board", user.email);
                    self.notices.push(SessionNotice::UserJoined(user));
                }
            }
            ServerMessage::UserLeft { user } => {
                if let Some(removed) = self.presence.leave(&user.id) {
                    log::info!("{} left the board", removed.email);
                    self.notices.push(SessionNotice::UserLeft(removed));
                }
            }
            ServerMessage::ActiveUsers { users } => {
                self.presence.replace(users);
            }
            ServerMessage::CursorUpdate { user } => {
                if let Some(cursor) = user.cursor {
                    self.presence.update_cursor(&user.id, cursor);
                }
            }
        }
    }

    // --- Local edits ---

    /// Commit a locally authored operation.
    ///
    /// The operation is appended to the log immediately; the server echo is
    /// recognized by id and not appended again.
    pub async fn submit_local(&mut self, operation: Operation) -> SessionResult<()> {
        let operation = self.buffer.commit(operation).clone();
        if self.log.append(operation.clone()) {
            self.repaint();
        }
        self.deliver(operation).await
    }

    /// Hide the latest local operation. Nothing is sent.
    pub fn undo(&mut self) -> bool {
        let Some(id) = self.buffer.undo().map(|op| op.id.clone()) else {
            return false;
        };
        log::debug!("Undid {}", id);
        self.repaint();
        true
    }

    /// Restore the latest undone operation and send it again.
    pub async fn redo(&mut self) -> SessionResult<bool> {
        let Some(operation) = self.buffer.redo().cloned() else {
            return Ok(false);
        };
        log::debug!("Redid {}", operation.id);
        self.log.append(operation.clone());
        self.repaint();
        self.deliver(operation).await?;
        Ok(true)
    }

    /// Wipe the board with a new clear operation.
    pub async fn clear_board(&mut self) -> SessionResult<()> {
        let clear = self.factory.clear();
        self.buffer.clear(clear.clone());
        self.log.append(clear.clone());
        self.repaint();
        self.deliver(clear).await
    }

    /// Share the local cursor while connected.
    pub fn set_cursor(&mut self, x: f64, y: f64) {
        if !self.channel.is_open() {
            return;
        }
        if let Err(e) = self.channel.send_cursor(CursorPosition { x, y }) {
            log::debug!("Cursor update dropped: {}", e);
        }
    }

    /// Recompute the visible list and hand it to the view.
    pub fn repaint(&mut self) {
        let visible = visible_operations(&self.log, &self.buffer);
        self.view.repaint(&visible);
    }

    /// Send over the channel, else the HTTP fallback, else keep it pending.
    async fn deliver(&mut self, operation: Operation) -> SessionResult<()> {
        if self.channel.is_open() {
            match self.channel.send_operation(&operation) {
                Ok(()) => return Ok(()),
                Err(e) => log::warn!("Channel send failed, trying HTTP fallback: {}", e),
            }
        }

        let api = Arc::clone(&self.api);
        match api.append_operation(&self.board_id, &operation).await {
            Ok(()) => {
                log::info!("Delivered {} through HTTP fallback", operation.id);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                log::error!("Could not deliver {}: {}", operation.id, reason);
                self.notices.push(SessionNotice::SendFailed {
                    operation: operation.id.clone(),
                    reason: reason.clone(),
                });
                let id = operation.id.clone();
                if self.pending.iter().all(|p| p.id != id) {
                    self.pending.push(operation);
                }
                Err(SessionError::Undelivered { operation: id, reason })
            }
        }
    }

    /// Resend undelivered operations once the channel is open.
    fn flush_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for operation in pending {
            if self.buffer.is_undone(&operation.id) {
                // Redo sends it again if the user wants it back.
                continue;
            }
            match self.channel.send_operation(&operation) {
                Ok(()) => log::info!("Flushed pending operation {}", operation.id),
                Err(e) => {
                    log::warn!("Pending operation {} still undelivered: {}", operation.id, e);
                    self.pending.push(operation);
                }
            }
        }
    }
}

fn visible_operations<'a>(log: &'a OperationLog, buffer: &EditBuffer) -> Vec<&'a Operation> {
    let hidden: HashSet<&OperationId> = buffer.undone_ids().collect();
    log.iter().filter(|op| !hidden.contains(&op.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBoardApi;
    use crate::sync::{ClientMessage, CursorUser, TransportEvent};
    use crate::testing::{LoopbackTransport, block_on};
    use url::Url;

    #[derive(Default)]
    struct FrameLog {
        frames: Vec<Vec<OperationId>>,
    }

    impl Repaint for FrameLog {
        fn repaint(&mut self, operations: &[&Operation]) {
            self.frames.push(operations.iter().map(|op| op.id.clone()).collect());
        }
    }

    type TestSession = SessionCoordinator<LoopbackTransport, MemoryBoardApi, FrameLog>;

    fn session() -> (TestSession, LoopbackTransport, Arc<MemoryBoardApi>) {
        let remote = LoopbackTransport::new();
        let url = Url::parse("ws://localhost/api/boards/B1/ws").unwrap();
        let channel = SyncChannel::new(remote.clone(), url);
        let api = Arc::new(MemoryBoardApi::new());
        api.insert(BoardSnapshot::new("B1"));
        let session = SessionCoordinator::new(
            "B1",
            channel,
            Arc::clone(&api),
            FrameLog::default(),
            OperationFactory::new(Some("me".into())),
        );
        (session, remote, api)
    }

    fn open(session: &mut TestSession, remote: &LoopbackTransport) {
        session.connect().unwrap();
        remote.push(TransportEvent::Opened);
        session.poll(Instant::now());
        assert_eq!(session.channel_state(), ChannelState::Open);
    }

    fn push(remote: &LoopbackTransport, message: ServerMessage) {
        remote.push_text(&message.to_json().unwrap());
    }

    fn ids(ops: &[&Operation]) -> Vec<OperationId> {
        ops.iter().map(|op| op.id.clone()).collect()
    }

    fn sent_operations(remote: &LoopbackTransport) -> Vec<OperationId> {
        remote
            .sent()
            .iter()
            .filter_map(|text| match serde_json::from_str::<ClientMessage>(text) {
                Ok(ClientMessage::Operation { operation }) => Some(operation.id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (mut session, remote, _api) = session();
        let other = OperationFactory::new(Some("other".into()));
        let op_a = other.default_draw(vec![kurbo::Point::new(0.0, 0.0), kurbo::Point::new(5.0, 5.0)]);
        let op_b = other.default_text(10.0, 10.0, "B");

        open(&mut session, &remote);
        assert_eq!(remote.sent()[0], r#"{"type":"sync_request"}"#);

        push(&remote, ServerMessage::Sync { operations: vec![op_a.clone(), op_b.clone()] });
        session.poll(Instant::now());

        let op_c = session.factory().pan(1.0, 1.0);
        block_on(session.submit_local(op_c.clone())).unwrap();
        assert_eq!(
            session.log().ids().cloned().collect::<Vec<_>>(),
            vec![op_a.id.clone(), op_b.id.clone(), op_c.id.clone()]
        );

        push(&remote, ServerMessage::Operation { operation: op_c.clone() });
        session.poll(Instant::now());
        assert_eq!(session.log().len(), 3);

        assert!(session.undo());
        assert_eq!(session.edit_buffer().redo_stack(), &[op_c.clone()]);
        assert_eq!(ids(&session.visible_operations()), vec![op_a.id.clone(), op_b.id.clone()]);
        assert_eq!(session.log().len(), 3);

        remote.clear_sent();
        assert!(block_on(session.redo()).unwrap());
        assert_eq!(sent_operations(&remote), vec![op_c.id.clone()]);
        assert_eq!(session.visible_operations().len(), 3);
        assert_eq!(session.log().len(), 3);
    }

    #[test]
    fn test_undone_operation_stays_hidden_after_next_edit() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        let op_a = session.factory().pan(1.0, 1.0);
        block_on(session.submit_local(op_a.clone())).unwrap();
        assert!(session.undo());
        assert!(session.visible_operations().is_empty());

        let op_b = session.factory().pan(2.0, 2.0);
        block_on(session.submit_local(op_b.clone())).unwrap();
        assert!(!session.edit_buffer().can_redo());
        assert_eq!(ids(&session.visible_operations()), vec![op_b.id.clone()]);
        assert_eq!(session.view().frames.last().unwrap(), &vec![op_b.id.clone()]);

        // Only the authoritative log brings it back.
        push(&remote, ServerMessage::Sync { operations: vec![op_a.clone(), op_b.clone()] });
        session.poll(Instant::now());
        assert_eq!(ids(&session.visible_operations()), vec![op_a.id.clone(), op_b.id.clone()]);
    }

    #[test]
    fn test_every_log_mutation_repaints() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        let factory = OperationFactory::anonymous();
        let before = session.view().frames.len();

        push(&remote, ServerMessage::Sync { operations: vec![factory.clear()] });
        push(&remote, ServerMessage::Operation { operation: factory.pan(1.0, 0.0) });
        session.poll(Instant::now());
        assert_eq!(session.view().frames.len(), before + 2);

        block_on(session.submit_local(factory.pan(0.0, 1.0))).unwrap();
        assert_eq!(session.view().frames.len(), before + 3);
        assert_eq!(session.view().frames.last().unwrap().len(), 3);
    }

    #[test]
    fn test_load_initial_seeds_log() {
        let (mut session, _remote, api) = session();
        let factory = OperationFactory::anonymous();
        let persisted = vec![factory.clear(), factory.pan(2.0, 2.0)];
        let mut board = BoardSnapshot::new("B1");
        board.title = "Lecture".into();
        board.canvas_operations = persisted.clone();
        api.insert(board);

        // A local edit made while loading survives the seed.
        block_on(session.submit_local(factory.pan(3.0, 3.0))).unwrap();

        block_on(session.load_initial()).unwrap();
        assert!(!session.is_loading());
        assert_eq!(session.board().unwrap().title, "Lecture");
        assert!(session.board().unwrap().canvas_operations.is_empty());
        let ids: Vec<_> = session.log().ids().cloned().collect();
        assert_eq!(ids[..2], [persisted[0].id.clone(), persisted[1].id.clone()]);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_load_failure_is_recoverable() {
        let (mut session, remote, api) = session();
        api.set_offline(true);

        assert!(block_on(session.load_initial()).is_err());
        let notices = session.take_notices();
        assert!(matches!(notices.as_slice(), [SessionNotice::SnapshotFailed(_)]));

        // Still usable locally and over the channel.
        open(&mut session, &remote);
        let op = session.factory().pan(1.0, 1.0);
        block_on(session.submit_local(op.clone())).unwrap();
        assert!(session.log().contains(&op.id));
    }

    #[test]
    fn test_http_fallback_when_channel_closed() {
        let (mut session, remote, api) = session();
        let op = session.factory().pan(4.0, 4.0);

        block_on(session.submit_local(op.clone())).unwrap();
        assert!(remote.sent().is_empty());
        assert_eq!(api.operations("B1"), vec![op.clone()]);
        assert!(session.log().contains(&op.id));
        assert!(session.pending().is_empty());
    }

    #[test]
    fn test_undeliverable_operation_stays_local_and_flushes_on_open() {
        let (mut session, remote, api) = session();
        api.set_offline(true);
        let op = session.factory().pan(4.0, 4.0);

        let result = block_on(session.submit_local(op.clone()));
        assert!(matches!(result, Err(SessionError::Undelivered { .. })));
        assert!(session.log().contains(&op.id));
        assert_eq!(session.pending(), &[op.clone()]);
        assert!(matches!(
            session.take_notices().as_slice(),
            [SessionNotice::SendFailed { .. }]
        ));

        open(&mut session, &remote);
        assert_eq!(sent_operations(&remote), vec![op.id.clone()]);
        assert!(session.pending().is_empty());
    }

    #[test]
    fn test_sync_makes_undone_operations_visible_again() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        let op = session.factory().pan(1.0, 1.0);
        block_on(session.submit_local(op.clone())).unwrap();
        session.undo();
        assert!(session.visible_operations().is_empty());

        push(&remote, ServerMessage::Sync { operations: vec![op.clone()] });
        session.poll(Instant::now());
        assert_eq!(ids(&session.visible_operations()), vec![op.id.clone()]);
        assert!(!session.edit_buffer().can_redo());
    }

    #[test]
    fn test_sync_keeps_unsynced_undone_operations_redoable() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        let op = session.factory().pan(1.0, 1.0);
        block_on(session.submit_local(op.clone())).unwrap();
        session.undo();

        push(&remote, ServerMessage::Sync { operations: vec![] });
        session.poll(Instant::now());
        assert!(session.log().is_empty());
        assert!(session.edit_buffer().can_redo());

        assert!(block_on(session.redo()).unwrap());
        assert!(session.log().contains(&op.id));
    }

    #[test]
    fn test_clear_board() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        let pan = session.factory().pan(1.0, 0.0);
        block_on(session.submit_local(pan)).unwrap();
        block_on(session.clear_board()).unwrap();

        let buffer = session.edit_buffer();
        assert_eq!(buffer.undo_stack().len(), 1);
        assert!(buffer.undo_stack()[0].is_clear());
        assert!(session.log().iter().last().unwrap().is_clear());
        assert_eq!(sent_operations(&remote).len(), 2);
    }

    #[test]
    fn test_presence_messages() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        session.take_notices();

        let alice = ActiveUser::new("a", "alice@example.com");
        push(&remote, ServerMessage::ActiveUsers { users: vec![ActiveUser::new("me", "me@example.com")] });
        push(&remote, ServerMessage::UserJoined { user: alice.clone() });
        push(&remote, ServerMessage::UserJoined { user: alice.clone() });
        push(
            &remote,
            ServerMessage::CursorUpdate {
                user: CursorUser { id: "a".into(), cursor: Some(CursorPosition { x: 5.0, y: 6.0 }) },
            },
        );
        push(&remote, ServerMessage::UserLeft { user: ActiveUser::new("ghost", "") });
        session.poll(Instant::now());

        assert_eq!(session.presence().len(), 2);
        assert_eq!(
            session.presence().get("a").unwrap().cursor,
            Some(CursorPosition { x: 5.0, y: 6.0 })
        );
        assert_eq!(session.take_notices(), vec![SessionNotice::UserJoined(alice.clone())]);

        push(&remote, ServerMessage::UserLeft { user: alice.clone() });
        session.poll(Instant::now());
        assert!(!session.presence().contains("a"));
        assert!(matches!(session.take_notices().as_slice(), [SessionNotice::UserLeft(_)]));
    }

    #[test]
    fn test_malformed_inbound_leaves_log_untouched() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        let op = OperationFactory::anonymous().clear();
        push(&remote, ServerMessage::Operation { operation: op.clone() });
        remote.push_text("{{{");
        remote.push_text(r#"{"type":"operation","operation":{"id":"x","type":"warp","timestamp":1}}"#);
        session.poll(Instant::now());

        assert_eq!(session.log().len(), 1);
        assert!(session.log().contains(&op.id));
    }

    #[test]
    fn test_disconnect_notices() {
        let (mut session, remote, _api) = session();
        open(&mut session, &remote);
        session.take_notices();

        remote.push(TransportEvent::Closed { code: 1011, reason: "server error".into() });
        session.poll(Instant::now());
        assert_eq!(
            session.take_notices(),
            vec![SessionNotice::Disconnected { code: 1011, reconnecting: true }]
        );

        session.shutdown();
        assert_eq!(session.channel_state(), ChannelState::Disconnected);
        assert!(session.channel().reconnect_deadline().is_none());
    }

    #[test]
    fn test_cursor_sent_only_when_open() {
        let (mut session, remote, _api) = session();
        session.set_cursor(1.0, 2.0);
        assert!(remote.sent().is_empty());

        open(&mut session, &remote);
        session.set_cursor(1.0, 2.0);
        assert_eq!(remote.sent().last().unwrap(), r#"{"type":"cursor_update","cursor":{"x":1.0,"y":2.0}}"#);
    }
}
