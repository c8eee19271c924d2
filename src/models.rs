use serde::{Deserialize, Serialize};

// --- Lifecycle & progression ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Lead,
    Option,
    Confirmed,
    Cancelled,
}

impl EventStatus {
    /// A room is held iff the event carries a lock and sits in one of these.
    pub fn holds_room(self) -> bool {
        matches!(self, EventStatus::Option | EventStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::Lead => "lead",
            EventStatus::Option => "option",
            EventStatus::Confirmed => "confirmed",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SiteVisitStatus {
    Idle,
    Proposed,
    TimePending,
    ConfirmPending,
    Scheduled,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SiteVisitState {
    pub status: SiteVisitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_time: Option<String>,
    #[serde(default)]
    pub proposed_slots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_time: Option<String>,
}

impl Default for SiteVisitState {
    fn default() -> Self {
        SiteVisitState {
            status: SiteVisitStatus::Idle,
            requested_date: None,
            requested_time: None,
            proposed_slots: Vec::new(),
            confirmed_date: None,
            confirmed_time: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DepositInfo {
    pub required: bool,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BillingAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_id: Option<String>,
}

impl BillingAddress {
    /// Street, postal code and city are the minimum for an invoice.
    pub fn is_complete(&self) -> bool {
        let filled = |f: &Option<String>| f.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.street) && filled(&self.postal_code) && filled(&self.city)
    }
}

/// Profile fields captured opportunistically at any step.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EventProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub product_wishes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditEntry {
    pub from_step: u8,
    pub to_step: u8,
    pub reason: String,
    pub at: String,
}

/// The full per-event record. Persisted as one JSON column; hot fields are
/// mirrored into indexed columns on every save (see db::save_event).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EventRecord {
    pub id: String,
    pub tenant_id: String,
    pub client_email: String,
    pub thread_id: String,
    pub current_step: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_step: Option<u8>,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_eval_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_hash: Option<String>,
    #[serde(default)]
    pub offer_accepted: bool,
    #[serde(default)]
    pub awaiting_billing_for_accept: bool,
    #[serde(default)]
    pub awaiting_conflict_reason: bool,
    #[serde(default)]
    pub profile: EventProfile,
    #[serde(default)]
    pub billing: BillingAddress,
    #[serde(default)]
    pub deposit: DepositInfo,
    #[serde(default)]
    pub site_visit: SiteVisitState,
    #[serde(default)]
    pub excluded_rooms: Vec<String>,
    #[serde(default)]
    pub counter_rounds: u32,
    #[serde(default)]
    pub failed_date_proposals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_room_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_confirmation_prefix: Option<String>,
    #[serde(default)]
    pub confirmation_sent: bool,
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
    pub created_at: String,
    pub updated_at: String,
}

impl EventRecord {
    pub fn new(tenant_id: &str, client_email: &str, thread_id: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        EventRecord {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            client_email: client_email.to_string(),
            thread_id: thread_id.to_string(),
            current_step: 1,
            caller_step: None,
            status: EventStatus::Lead,
            chosen_date: None,
            locked_room_id: None,
            room_eval_hash: None,
            offer_hash: None,
            offer_accepted: false,
            awaiting_billing_for_accept: false,
            awaiting_conflict_reason: false,
            profile: EventProfile::default(),
            billing: BillingAddress::default(),
            deposit: DepositInfo::default(),
            site_visit: SiteVisitState::default(),
            excluded_rooms: Vec::new(),
            counter_rounds: 0,
            failed_date_proposals: 0,
            cleared_room_name: None,
            room_confirmation_prefix: None,
            confirmation_sent: false,
            audit: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn record_transition(&mut self, to_step: u8, reason: &str) {
        if to_step == self.current_step {
            return;
        }
        self.audit.push(AuditEntry {
            from_step: self.current_step,
            to_step,
            reason: reason.to_string(),
            at: chrono::Utc::now().to_rfc3339(),
        });
        self.current_step = to_step;
    }
}

// --- Detection ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    EventRequest,
    Question,
    Acceptance,
    Rejection,
    Confirmation,
    ChangeRequest,
    ManagerRequest,
    Nonsense,
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QnaType {
    Rooms,
    Products,
    Pricing,
    Availability,
    SiteVisit,
    General,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Entities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_visit_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_visit_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_type_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

/// Diagnostic record attached to any reply produced by a fallback path.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FallbackContext {
    pub source: String,
    pub trigger: String,
    #[serde(default)]
    pub failed_conditions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_error: Option<String>,
}

/// Providers may omit fields they consider false/empty, so everything
/// defaults; a fully blank object parses as a low-signal "other".
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectionResult {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_intent")]
    pub intent: Intent,
    #[serde(default)]
    pub is_question: bool,
    #[serde(default)]
    pub is_acceptance: bool,
    #[serde(default)]
    pub is_rejection: bool,
    #[serde(default)]
    pub is_confirmation: bool,
    #[serde(default)]
    pub is_change_request: bool,
    #[serde(default)]
    pub is_manager_request: bool,
    #[serde(default)]
    pub is_ambiguous: bool,
    #[serde(default)]
    pub has_injection_attempt: bool,
    #[serde(default)]
    pub qna_types: Vec<QnaType>,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fallback: Option<FallbackContext>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_intent() -> Intent {
    Intent::Other
}

fn default_confidence() -> f64 {
    0.5
}

impl DetectionResult {
    pub fn empty(intent: Intent) -> Self {
        DetectionResult {
            language: "en".to_string(),
            intent,
            is_question: false,
            is_acceptance: false,
            is_rejection: false,
            is_confirmation: false,
            is_change_request: false,
            is_manager_request: false,
            is_ambiguous: false,
            has_injection_attempt: false,
            qna_types: Vec::new(),
            entities: Entities::default(),
            confidence: 1.0,
            fallback: None,
        }
    }

    /// True when the message carries a workflow action, not just a question.
    pub fn has_action_signal(&self) -> bool {
        self.is_acceptance || self.is_rejection || self.is_confirmation || self.is_change_request
    }
}

// --- Step handler contract ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    OfferMessage,
    ConfirmationMessage,
    AiReplyApproval,
    SoftRoomConflictNotification,
    RoomConflictResolution,
    ManagerRequest,
}

impl TaskCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskCategory::OfferMessage => "offer_message",
            TaskCategory::ConfirmationMessage => "confirmation_message",
            TaskCategory::AiReplyApproval => "ai_reply_approval",
            TaskCategory::SoftRoomConflictNotification => "soft_room_conflict_notification",
            TaskCategory::RoomConflictResolution => "room_conflict_resolution",
            TaskCategory::ManagerRequest => "manager_request",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offer_message" => Some(TaskCategory::OfferMessage),
            "confirmation_message" => Some(TaskCategory::ConfirmationMessage),
            "ai_reply_approval" => Some(TaskCategory::AiReplyApproval),
            "soft_room_conflict_notification" => Some(TaskCategory::SoftRoomConflictNotification),
            "room_conflict_resolution" => Some(TaskCategory::RoomConflictResolution),
            "manager_request" => Some(TaskCategory::ManagerRequest),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Draft {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_markdown: Option<String>,
    pub requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    /// True when an LLM rewrote any part of the body (ai_reply_approval scope).
    #[serde(default)]
    pub llm_generated: bool,
}

impl Draft {
    pub fn plain(body: impl Into<String>) -> Self {
        Draft {
            body: body.into(),
            body_markdown: None,
            requires_approval: false,
            category: None,
            llm_generated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Keep routing: dispatch the (possibly changed) current step next.
    Advance,
    /// Backward jump with caller_step bookkeeping handled by the router.
    Detour { target: u8, reason: &'static str },
    Halt,
    /// Silent ignore: no reply, no state change.
    Ignore,
    /// Step 1 jumped straight to the offer.
    Shortcut,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub drafts: Vec<Draft>,
    pub action: StepAction,
    pub halt: bool,
}

impl StepResult {
    pub fn halt_with(drafts: Vec<Draft>) -> Self {
        StepResult { drafts, action: StepAction::Halt, halt: true }
    }

    pub fn advance() -> Self {
        StepResult { drafts: Vec::new(), action: StepAction::Advance, halt: false }
    }

    pub fn advance_with(drafts: Vec<Draft>) -> Self {
        StepResult { drafts, action: StepAction::Advance, halt: false }
    }

    pub fn ignore() -> Self {
        StepResult { drafts: Vec::new(), action: StepAction::Ignore, halt: true }
    }
}

// --- Guards & gate ---

#[derive(Debug, Clone, Default)]
pub struct GuardSnapshot {
    pub forced_step: Option<u8>,
    pub requirements_hash_changed: bool,
    pub deposit_bypass: bool,
    pub billing_flow: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GateStatus {
    pub offer_accepted: bool,
    pub billing_complete: bool,
    pub deposit_required: bool,
    pub deposit_paid: bool,
    pub ready_for_hil: bool,
}

// --- HIL tasks ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
    Stale,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Stale => "stale",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HilTask {
    pub id: String,
    pub tenant_id: String,
    pub event_id: String,
    pub thread_id: String,
    pub category: TaskCategory,
    pub status: TaskStatus,
    pub draft_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_body_markdown: Option<String>,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_body: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

// --- Messages (transcript) ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub tenant_id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub direction: String,
    pub sender: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub created_at: String,
    pub seq: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InboundExtras {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub skip_dev_choice: Option<bool>,
    #[serde(default)]
    pub deposit_just_paid: Option<bool>,
}

/// One inbound turn, as handed to the pre-route pipeline.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub tenant_id: String,
    pub client_email: String,
    pub thread_id: String,
    pub body: String,
    pub subject: Option<String>,
    pub extras: InboundExtras,
}

// --- API payloads ---

#[derive(Debug, Deserialize)]
pub struct StartConversation {
    pub client_email: String,
    #[serde(default)]
    pub client_name: Option<String>,
    pub email_body: String,
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub thread_id: String,
    pub client_email: String,
    pub body: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub extras: Option<InboundExtras>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub response: String,
    pub event_info: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_info: Option<DepositInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_actions: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_context: Option<FallbackContext>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveTaskBody {
    #[serde(default)]
    pub edited_message: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectTaskBody {
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelEventBody {
    pub confirmation: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositPayBody {
    pub event_id: String,
}

// --- Activity log ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ActivityEntry {
    pub id: String,
    pub event_id: String,
    pub granularity: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub created_at: String,
}
