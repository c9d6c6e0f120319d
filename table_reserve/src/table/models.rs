//! Physical table models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Table ID type
pub type TableId = i64;

/// Table shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableShape {
    Round,
    Square,
    Rectangular,
}

impl std::fmt::Display for TableShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableShape::Round => write!(f, "round"),
            TableShape::Square => write!(f, "square"),
            TableShape::Rectangular => write!(f, "rectangular"),
        }
    }
}

impl std::str::FromStr for TableShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round" => Ok(TableShape::Round),
            "square" => Ok(TableShape::Square),
            "rectangular" => Ok(TableShape::Rectangular),
            other => Err(format!("Unknown table shape: {}", other)),
        }
    }
}

/// Location zone of a table within the restaurant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationZone {
    Indoor,
    Outdoor,
    Bar,
    Private,
}

impl std::fmt::Display for LocationZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationZone::Indoor => write!(f, "indoor"),
            LocationZone::Outdoor => write!(f, "outdoor"),
            LocationZone::Bar => write!(f, "bar"),
            LocationZone::Private => write!(f, "private"),
        }
    }
}

impl std::str::FromStr for LocationZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "indoor" => Ok(LocationZone::Indoor),
            "outdoor" => Ok(LocationZone::Outdoor),
            "bar" => Ok(LocationZone::Bar),
            "private" => Ok(LocationZone::Private),
            other => Err(format!("Unknown location zone: {}", other)),
        }
    }
}

/// Table status as reported by the store or the availability feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
    Maintenance,
}

impl TableStatus {
    /// Whether a table in this status can be offered to a new party
    pub fn is_available(&self) -> bool {
        matches!(self, TableStatus::Available)
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableStatus::Available => write!(f, "available"),
            TableStatus::Occupied => write!(f, "occupied"),
            TableStatus::Reserved => write!(f, "reserved"),
            TableStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl std::str::FromStr for TableStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TableStatus::Available),
            "occupied" => Ok(TableStatus::Occupied),
            "reserved" => Ok(TableStatus::Reserved),
            "maintenance" => Ok(TableStatus::Maintenance),
            other => Err(format!("Unknown table status: {}", other)),
        }
    }
}

/// Floor-plan position, used only by presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutPosition {
    pub x: f64,
    pub y: f64,
}

/// A physical seating unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table ID
    pub id: TableId,
    /// Number painted on the table
    pub number: u32,
    /// Seating capacity
    pub capacity: u32,
    pub shape: TableShape,
    pub location: LocationZone,
    /// Descriptive tags such as "window-view", "quiet" or "accessible"
    pub features: BTreeSet<String>,
    pub status: TableStatus,
    pub position: Option<LayoutPosition>,
}

impl Table {
    /// Create an available table with no features
    pub fn new(id: TableId, number: u32, capacity: u32, location: LocationZone) -> Self {
        Self {
            id,
            number,
            capacity,
            shape: TableShape::Square,
            location,
            features: BTreeSet::new(),
            status: TableStatus::Available,
            position: None,
        }
    }

    /// Set the table shape
    pub fn with_shape(mut self, shape: TableShape) -> Self {
        self.shape = shape;
        self
    }

    /// Add feature tags
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features.extend(features.into_iter().map(Into::into));
        self
    }

    /// Set the table status
    pub fn with_status(mut self, status: TableStatus) -> Self {
        self.status = status;
        self
    }

    /// Check whether the table has a feature tag
    pub fn has_feature(&self, tag: &str) -> bool {
        self.features.contains(tag)
    }

    /// Whether the table can seat a party of the given size
    pub fn fits(&self, guest_count: u32) -> bool {
        self.capacity >= guest_count
    }
}
