//! Drivers and the snapshot embedded into orders at pickup.

use serde::{Deserialize, Serialize};

/// How a driver gets around town.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleType {
    Motorcycle,
    Car,
    Bicycle,
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VehicleType::Motorcycle => "motorcycle",
            VehicleType::Car => "car",
            VehicleType::Bicycle => "bicycle",
        };
        f.write_str(s)
    }
}

/// Static profile of a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    pub rating: f32,
}

/// A courier in the bounded pool.
///
/// Invariant: `available` XOR `current_order.is_some()`. A driver either is
/// free or holds exactly one order, never both and never neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub id: String,
    pub profile: DriverProfile,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_order: Option<String>,
}

impl Driver {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        vehicle_type: VehicleType,
        rating: f32,
    ) -> Self {
        Self {
            id: id.into(),
            profile: DriverProfile {
                name: name.into(),
                phone: phone.into(),
                vehicle_type,
                rating,
            },
            available: true,
            current_order: None,
        }
    }

    /// The immutable view stamped onto an order at pickup.
    pub fn snapshot(&self) -> DriverSnapshot {
        DriverSnapshot {
            id: self.id.clone(),
            name: self.profile.name.clone(),
            phone: self.profile.phone.clone(),
            vehicle_type: self.profile.vehicle_type,
            rating: self.profile.rating,
        }
    }

    /// The seed pool registered once at startup.
    pub fn samples() -> Vec<Driver> {
        vec![
            Driver::new("driver-1", "Aziz Rahimov", "+998901234567", VehicleType::Motorcycle, 4.8),
            Driver::new("driver-2", "Bobur Karimov", "+998902345678", VehicleType::Car, 4.9),
            Driver::new("driver-3", "Dilshod Toshmatov", "+998903456789", VehicleType::Motorcycle, 4.7),
            Driver::new("driver-4", "Eldor Sharipov", "+998904567890", VehicleType::Bicycle, 4.6),
        ]
    }
}

/// Driver details carried inside the order snapshot once assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSnapshot {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub vehicle_type: VehicleType,
    pub rating: f32,
}
