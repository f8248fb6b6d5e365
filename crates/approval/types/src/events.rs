//! Decision events emitted after committed transitions

use crate::{ApprovalRequest, InstitutionId, RequestId, ResourceRef, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields every event carries
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub request_id: RequestId,
    pub resource: ResourceRef,
    pub institution_id: InstitutionId,
    pub submitter_id: UserId,
    pub actor_id: UserId,
    pub timestamp: DateTime<Utc>,
}

impl EventContext {
    pub fn for_request(request: &ApprovalRequest, actor_id: &UserId) -> Self {
        Self {
            request_id: request.id().clone(),
            resource: request.resource().clone(),
            institution_id: request.institution_id().clone(),
            submitter_id: request.submitted_by().clone(),
            actor_id: actor_id.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Events consumed by the notification collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalEvent {
    RequestSubmitted {
        context: EventContext,
        level: u32,
    },
    RequestAdvanced {
        context: EventContext,
        from_level: u32,
        to_level: u32,
    },
    RequestApproved {
        context: EventContext,
        level: u32,
    },
    RequestRejected {
        context: EventContext,
        level: u32,
        reason: String,
    },
    RequestReturned {
        context: EventContext,
        level: u32,
        comments: String,
    },
}

impl ApprovalEvent {
    pub fn context(&self) -> &EventContext {
        match self {
            Self::RequestSubmitted { context, .. }
            | Self::RequestAdvanced { context, .. }
            | Self::RequestApproved { context, .. }
            | Self::RequestRejected { context, .. }
            | Self::RequestReturned { context, .. } => context,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.context().request_id
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestSubmitted { .. } => "request_submitted",
            Self::RequestAdvanced { .. } => "request_advanced",
            Self::RequestApproved { .. } => "request_approved",
            Self::RequestRejected { .. } => "request_rejected",
            Self::RequestReturned { .. } => "request_returned",
        }
    }
}
