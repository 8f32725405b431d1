use serde::{Deserialize, Serialize};

use stockmaster_core::{BinId, DomainError, DomainResult, Entity, WarehouseId};

/// Physical stock location.
///
/// A quarantine warehouse holds goods outside normal operations (customer
/// returns awaiting inspection); return routing prefers it when one is
/// active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    id: WarehouseId,
    code: String,
    name: String,
    is_active: bool,
    is_quarantine: bool,
}

impl Warehouse {
    pub fn new(
        id: WarehouseId,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> DomainResult<Self> {
        let code = code.into();
        let name = name.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("warehouse code cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty"));
        }
        Ok(Self {
            id,
            code,
            name,
            is_active: true,
            is_quarantine: false,
        })
    }

    pub fn quarantine(mut self) -> Self {
        self.is_quarantine = true;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_quarantine(&self) -> bool {
        self.is_quarantine
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Bin location. Belongs to exactly one warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinLocation {
    id: BinId,
    warehouse_id: WarehouseId,
    code: String,
    description: Option<String>,
}

impl BinLocation {
    pub fn new(
        id: BinId,
        warehouse_id: WarehouseId,
        code: impl Into<String>,
        description: Option<String>,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("bin code cannot be empty"));
        }
        Ok(Self {
            id,
            warehouse_id,
            code,
            description,
        })
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Entity for BinLocation {
    type Id = BinId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
