//! Topology: the static farm structure: farms, paddocks and their ordered bays.
//!
//! Water flows through a paddock from the bay with `order == 1` towards the
//! bay flagged `is_last_bay`. The structure is owned by the external registry;
//! the control core only reads it.

mod chain;

pub use chain::{TopologyError, validate_chain};

use serde::{Deserialize, Serialize};

use crate::error::{NotFoundError, PwmError, ValidationError};
use crate::id::{BayId, FarmId, PaddockId};

/// Prefix used for generated bay names when none is configured.
pub const DEFAULT_BAY_PREFIX: &str = "B-";

/// A farm owning zero or more paddocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub id: FarmId,
    pub name: String,
}

impl Farm {
    #[must_use]
    pub fn new(id: impl Into<FarmId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A field unit containing an ordered chain of bays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paddock {
    pub id: PaddockId,
    pub name: String,
    pub farm_id: FarmId,
    pub bay_count: u32,
    #[serde(default = "default_bay_prefix")]
    pub bay_prefix: String,
}

fn default_bay_prefix() -> String {
    DEFAULT_BAY_PREFIX.to_string()
}

/// The smallest irrigable unit; position in the chain is given by `order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bay {
    pub id: BayId,
    pub paddock_id: PaddockId,
    pub name: String,
    pub order: u32,
    #[serde(default)]
    pub is_last_bay: bool,
}

impl Bay {
    /// Create the bay at `order` in `paddock`, named with the default prefix.
    #[must_use]
    pub fn new(paddock_id: &PaddockId, order: u32, is_last_bay: bool) -> Self {
        Self {
            id: BayId::for_order(paddock_id, order),
            paddock_id: paddock_id.clone(),
            name: format!("{DEFAULT_BAY_PREFIX}{order:02}"),
            order,
            is_last_bay,
        }
    }

    /// Whether this bay is at the head of the chain.
    #[must_use]
    pub fn is_first(&self) -> bool {
        self.order == 1
    }
}

/// Read-only snapshot of the whole farm structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    pub farms: Vec<Farm>,
    pub paddocks: Vec<Paddock>,
    pub bays: Vec<Bay>,
}

impl Topology {
    /// Register a farm.
    ///
    /// # Errors
    ///
    /// Returns [`PwmError::Validation`] when the name is empty or the id is
    /// already taken.
    pub fn add_farm(&mut self, farm: Farm) -> Result<(), PwmError> {
        if farm.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.farms.iter().any(|f| f.id == farm.id) {
            return Err(ValidationError::DuplicateId(farm.id.to_string()).into());
        }
        self.farms.push(farm);
        Ok(())
    }

    /// Create a paddock and generate its bay chain.
    ///
    /// Bays get orders `1..=bay_count`, names `{prefix}{order:02}` and the
    /// last one carries `is_last_bay`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyName`] for a blank name
    /// - [`ValidationError::NoBays`] when `bay_count` is zero
    /// - [`ValidationError::DuplicateId`] when the derived id already exists
    /// - [`NotFoundError`] when `farm_id` is unknown
    pub fn add_paddock(
        &mut self,
        farm_id: &FarmId,
        name: &str,
        bay_count: u32,
        bay_prefix: Option<&str>,
    ) -> Result<PaddockId, PwmError> {
        let id = PaddockId::from_name(name);
        if id.as_str().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if bay_count == 0 {
            return Err(ValidationError::NoBays.into());
        }
        if !self.farms.iter().any(|f| &f.id == farm_id) {
            return Err(NotFoundError {
                entity: "Farm",
                id: farm_id.to_string(),
            }
            .into());
        }
        if self.paddock(&id).is_some() {
            return Err(ValidationError::DuplicateId(id.to_string()).into());
        }

        let prefix = bay_prefix.unwrap_or(DEFAULT_BAY_PREFIX);
        for order in 1..=bay_count {
            let mut bay = Bay::new(&id, order, order == bay_count);
            bay.name = format!("{prefix}{order:02}");
            self.bays.push(bay);
        }
        self.paddocks.push(Paddock {
            id: id.clone(),
            name: name.trim().to_string(),
            farm_id: farm_id.clone(),
            bay_count,
            bay_prefix: prefix.to_string(),
        });
        Ok(id)
    }

    /// Remove a paddock together with all of its bays.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no paddock has this id.
    pub fn remove_paddock(&mut self, id: &PaddockId) -> Result<Paddock, PwmError> {
        let index = self
            .paddocks
            .iter()
            .position(|p| &p.id == id)
            .ok_or_else(|| NotFoundError {
                entity: "Paddock",
                id: id.to_string(),
            })?;
        self.bays.retain(|bay| &bay.paddock_id != id);
        Ok(self.paddocks.remove(index))
    }

    #[must_use]
    pub fn paddock(&self, id: &PaddockId) -> Option<&Paddock> {
        self.paddocks.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn bay(&self, id: &BayId) -> Option<&Bay> {
        self.bays.iter().find(|b| &b.id == id)
    }

    /// Bays of `paddock`, sorted by ascending `order`.
    #[must_use]
    pub fn chain(&self, paddock: &PaddockId) -> Vec<&Bay> {
        let mut bays: Vec<&Bay> = self
            .bays
            .iter()
            .filter(|bay| &bay.paddock_id == paddock)
            .collect();
        bays.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        bays
    }

    /// Validate the chain of one paddock.
    ///
    /// # Errors
    ///
    /// Returns the [`TopologyError`] describing the first violation.
    pub fn validate_paddock(&self, paddock: &PaddockId) -> Result<(), TopologyError> {
        validate_chain(&self.chain(paddock))
    }
}
