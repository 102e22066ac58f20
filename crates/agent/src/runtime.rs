use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use concierge_core::audit::{AuditContext, AuditEvent, AuditSink, NoopAuditSink, TurnEvent};
use concierge_core::domain::conversation::ConversationId;
use concierge_core::errors::ApplicationError;
use concierge_core::flows::ConversationEngine;

use crate::store::{ConversationRecord, ConversationStore, StoreError};

const CHANNEL_PREFIXES: &[&str] = &["whatsapp:", "sms:", "tel:"];
const ACTOR: &str = "traveler";

/// One message as delivered by a messaging channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: String,
    pub display_name: Option<String>,
    pub body: String,
    pub correlation_id: Option<String>,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self { sender: sender.into(), display_name: None, body: body.into(), correlation_id: None }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Sender address without its channel prefix, e.g. `whatsapp:+351...` becomes `+351...`.
    pub fn conversation_id(&self) -> ConversationId {
        let sender = self.sender.trim();
        let bare = CHANNEL_PREFIXES
            .iter()
            .find_map(|prefix| sender.strip_prefix(prefix))
            .unwrap_or(sender);
        ConversationId::new(bare.trim())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RuntimeReply {
    pub conversation_id: ConversationId,
    pub correlation_id: String,
    pub reply: String,
    pub status: String,
    pub completion_percentage: u8,
    /// Set when the turn could not be processed or stored and the fallback reply was sent.
    pub fallback: bool,
}

/// Runs conversation turns against a store. Turns for one identity are serialized; different
/// identities proceed in parallel.
pub struct ConversationRuntime {
    engine: Arc<ConversationEngine>,
    store: Arc<dyn ConversationStore>,
    audit: Arc<dyn AuditSink>,
    locks: Mutex<HashMap<ConversationId, TurnLock>>,
}

type TurnLock = Arc<tokio::sync::Mutex<()>>;

impl ConversationRuntime {
    pub fn new(engine: Arc<ConversationEngine>, store: Arc<dyn ConversationStore>) -> Self {
        Self { engine, store, audit: Arc::new(NoopAuditSink), locks: Mutex::new(HashMap::new()) }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Always produces a reply; failures become the fallback reply.
    pub async fn handle_message(&self, message: InboundMessage) -> RuntimeReply {
        let correlation_id =
            message.correlation_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let conversation_id = message.conversation_id();

        info!(
            event_name = "ingress.message_received",
            correlation_id = %correlation_id,
            conversation_id = conversation_id.as_str(),
            chars = message.body.chars().count(),
            "received traveler message"
        );

        match self.process(&conversation_id, &message, &correlation_id).await {
            Ok(reply) => reply,
            Err(failure) => self.fallback(conversation_id, correlation_id, failure),
        }
    }

    /// Every stored conversation, most recently active first.
    pub async fn conversations(&self) -> Result<Vec<ConversationRecord>, ApplicationError> {
        self.store.list().await.map_err(persistence)
    }

    async fn process(
        &self,
        conversation_id: &ConversationId,
        message: &InboundMessage,
        correlation_id: &str,
    ) -> Result<RuntimeReply, ApplicationError> {
        let turn_lock = self.turn_lock(conversation_id);
        let reply = {
            let _turn = turn_lock.lock().await;
            self.run_turn(conversation_id, message, correlation_id).await
        };
        self.release_turn_lock(conversation_id, turn_lock);
        reply
    }

    async fn run_turn(
        &self,
        conversation_id: &ConversationId,
        message: &InboundMessage,
        correlation_id: &str,
    ) -> Result<RuntimeReply, ApplicationError> {
        let now = Utc::now();
        let mut record = match self.store.load(conversation_id).await.map_err(persistence)? {
            Some(record) => record,
            None => self.new_record(conversation_id, message, now),
        };

        let audit = AuditContext::new(Some(conversation_id.clone()), correlation_id, ACTOR);
        let outcome = self.engine.process_turn_with_audit(
            &message.body,
            record.state.clone(),
            now,
            self.audit.as_ref(),
            &audit,
        );
        record.state = outcome.state;

        let reply = RuntimeReply {
            conversation_id: conversation_id.clone(),
            correlation_id: correlation_id.to_owned(),
            reply: outcome.reply,
            status: record.status().to_owned(),
            completion_percentage: record.state.completion_percentage,
            fallback: false,
        };
        self.store.save(record).await.map_err(persistence)?;

        info!(
            event_name = "ingress.reply_sent",
            correlation_id = %correlation_id,
            conversation_id = conversation_id.as_str(),
            status = %reply.status,
            completion = reply.completion_percentage,
            "replied to traveler"
        );
        Ok(reply)
    }

    fn new_record(
        &self,
        conversation_id: &ConversationId,
        message: &InboundMessage,
        now: DateTime<Utc>,
    ) -> ConversationRecord {
        info!(
            event_name = "conversation.started",
            conversation_id = conversation_id.as_str(),
            "new conversation started"
        );
        ConversationRecord::new(
            conversation_id.clone(),
            message.display_name.as_deref(),
            self.engine.initial_state(),
            now,
        )
    }

    fn fallback(
        &self,
        conversation_id: ConversationId,
        correlation_id: String,
        failure: ApplicationError,
    ) -> RuntimeReply {
        let interface = failure.clone().into_interface(correlation_id.clone());
        error!(
            event_name = "ingress.message_failed",
            correlation_id = %correlation_id,
            conversation_id = conversation_id.as_str(),
            error = %failure,
            "sending fallback reply"
        );

        let audit = AuditContext::new(Some(conversation_id.clone()), correlation_id.clone(), ACTOR);
        self.audit.emit(AuditEvent::new(
            &audit,
            TurnEvent::TurnFailed { reason: failure.to_string() },
            Utc::now(),
        ));

        RuntimeReply {
            conversation_id,
            correlation_id,
            reply: interface.user_message().to_owned(),
            status: "collecting_info".to_owned(),
            completion_percentage: 0,
            fallback: true,
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, HashMap<ConversationId, TurnLock>> {
        match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn turn_lock(&self, conversation_id: &ConversationId) -> TurnLock {
        self.lock_table().entry(conversation_id.clone()).or_default().clone()
    }

    /// Drops the identity's entry once no other turn holds or awaits it.
    fn release_turn_lock(&self, conversation_id: &ConversationId, turn_lock: TurnLock) {
        let mut locks = self.lock_table();
        // One reference in the table, one here.
        if Arc::strong_count(&turn_lock) == 2 {
            locks.remove(conversation_id);
        }
    }

    #[cfg(test)]
    fn tracked_identities(&self) -> usize {
        self.lock_table().len()
    }
}

fn persistence(error: StoreError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
