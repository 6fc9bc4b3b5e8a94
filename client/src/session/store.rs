use shared::{BackendKind, ErrorKind, ImageAsset, PredictionResult, Session, SessionStatus};
use std::collections::HashMap;

/// Identifies one prediction request. Only the latest ticket issued for a
/// backend may write to that backend's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub backend: BackendKind,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
    Mismatched,
}

#[derive(Debug, Default)]
struct Slot {
    session: Session,
    issued: u64,
}

#[derive(Debug)]
pub struct SessionStore {
    slots: HashMap<BackendKind, Slot>,
    active: BackendKind,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let slots = BackendKind::all()
            .into_iter()
            .map(|backend| (backend, Slot::default()))
            .collect();
        Self {
            slots,
            active: BackendKind::default(),
        }
    }

    fn slot_mut(&mut self, backend: BackendKind) -> &mut Slot {
        self.slots.entry(backend).or_default()
    }

    pub fn active(&self) -> BackendKind {
        self.active
    }

    pub fn select(&mut self, backend: BackendKind) {
        if self.active != backend {
            log::debug!("Active backend {} -> {}", self.active, backend);
        }
        self.active = backend;
    }

    pub fn session(&self, backend: BackendKind) -> Session {
        self.slots
            .get(&backend)
            .map(|slot| slot.session.clone())
            .unwrap_or_default()
    }

    pub fn active_session(&self) -> Session {
        self.session(self.active)
    }

    pub fn latest_seq(&self, backend: BackendKind) -> u64 {
        self.slots.get(&backend).map(|slot| slot.issued).unwrap_or(0)
    }

    /// A fresh image invalidates whatever was shown or pending for it.
    pub fn set_image(&mut self, backend: BackendKind, asset: ImageAsset) {
        let slot = self.slot_mut(backend);
        slot.issued += 1;
        slot.session = Session {
            image: Some(asset),
            result: None,
            status: SessionStatus::Idle,
            error_kind: None,
        };
    }

    pub fn begin_predict(&mut self, backend: BackendKind) -> RequestTicket {
        let slot = self.slot_mut(backend);
        if slot.session.status == SessionStatus::Loading {
            log::info!("Superseding in-flight {} request {}", backend, slot.issued);
        }
        slot.issued += 1;
        slot.session.result = None;
        slot.session.error_kind = None;
        slot.session.status = SessionStatus::Loading;
        RequestTicket {
            backend,
            seq: slot.issued,
        }
    }

    fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest_seq(ticket.backend) == ticket.seq
    }

    /// A current ticket carrying the other backend's result shape is recorded
    /// as a malformed response so the session never stays loading.
    pub fn complete_predict(&mut self, ticket: RequestTicket, result: PredictionResult) -> Completion {
        if !self.is_current(ticket) {
            log::info!(
                "Discarding stale {} response {} (latest {})",
                ticket.backend,
                ticket.seq,
                self.latest_seq(ticket.backend)
            );
            return Completion::Stale;
        }
        if result.backend() != ticket.backend {
            log::error!(
                "Dropping {} result addressed to {} session",
                result.backend(),
                ticket.backend
            );
            self.fail_predict(ticket, ErrorKind::MalformedResponse);
            return Completion::Mismatched;
        }

        let session = &mut self.slot_mut(ticket.backend).session;
        session.result = Some(result);
        session.error_kind = None;
        session.status = SessionStatus::Success;
        Completion::Applied
    }

    pub fn fail_predict(&mut self, ticket: RequestTicket, kind: ErrorKind) -> Completion {
        if !self.is_current(ticket) {
            log::info!(
                "Discarding stale {} failure {} ({:?})",
                ticket.backend,
                ticket.seq,
                kind
            );
            return Completion::Stale;
        }

        let session = &mut self.slot_mut(ticket.backend).session;
        session.result = None;
        session.error_kind = Some(kind);
        session.status = SessionStatus::Error;
        Completion::Applied
    }
}
