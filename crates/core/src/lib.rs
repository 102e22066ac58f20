pub mod audit;
pub mod compose;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod flows;
pub mod progress;
pub mod schema;

pub use audit::{AuditContext, AuditEvent, AuditOutcome, AuditSink, TurnEvent};
pub use compose::ResponseComposer;
pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat};
pub use domain::conversation::{ConversationId, ConversationState, TurnRecord};
pub use domain::slots::{Currency, ExtractionResult, Money, SlotValue, TravelInfo};
pub use errors::{ApplicationError, DomainError, InterfaceError, FALLBACK_REPLY};
pub use extraction::{ExtractionPolicy, Recognizer, RecognizerRegistry, RuleBasedExtractor};
pub use flows::{ConversationEngine, ConversationPhase, TurnOutcome};
pub use progress::{next_field, progress};
pub use schema::{FieldDefinition, FieldKind, FieldSchema, SchemaError};
