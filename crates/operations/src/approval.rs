//! Approval gating for high-impact documents.
//!
//! Policies decide *at creation* whether a document will need an approval
//! before it can complete; the engine consults the flag at validation time.
//! Only manager-level actors may approve.

use std::sync::RwLock;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockmaster_core::{UserId, WarehouseId};

use crate::document::DocumentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    InventoryManager,
    Operator,
}

/// Authenticated actor identity, consumed read-only from the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn can_approve(&self) -> bool {
        matches!(self.role, Role::Admin | Role::InventoryManager)
    }
}

/// One approval rule.
///
/// `warehouse_id = None` makes the rule global. A missing threshold means
/// approval is always required for matching documents; otherwise it is
/// required when the document's total quantity meets or exceeds the
/// threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub kind: DocumentKind,
    pub warehouse_id: Option<WarehouseId>,
    pub threshold_total_quantity: Option<Decimal>,
    pub is_active: bool,
}

#[derive(Debug, Default)]
pub struct ApprovalPolicies {
    policies: RwLock<Vec<ApprovalPolicy>>,
}

impl ApprovalPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, policy: ApprovalPolicy) {
        if let Ok(mut policies) = self.policies.write() {
            policies.push(policy);
        }
    }

    /// Whether any active policy requires approval for this document.
    pub fn requires_approval(
        &self,
        kind: DocumentKind,
        warehouse_id: WarehouseId,
        total_quantity: Decimal,
    ) -> bool {
        let Ok(policies) = self.policies.read() else {
            return false;
        };
        policies
            .iter()
            .filter(|p| p.is_active && p.kind == kind)
            .filter(|p| p.warehouse_id.is_none() || p.warehouse_id == Some(warehouse_id))
            .any(|p| match p.threshold_total_quantity {
                None => true,
                Some(threshold) => total_quantity >= threshold,
            })
    }
}
