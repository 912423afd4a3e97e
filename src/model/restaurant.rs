//! Restaurant seed data.

use serde::{Deserialize, Serialize};

/// A restaurant known to the order desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub cuisine: String,
    /// Average preparation time in (simulated) minutes.
    pub average_preparation_time: u32,
}

impl Restaurant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        cuisine: impl Into<String>,
        average_preparation_time: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            cuisine: cuisine.into(),
            average_preparation_time,
        }
    }

    /// The restaurants registered at startup.
    pub fn samples() -> Vec<Restaurant> {
        vec![
            Restaurant::new("rest-1", "Osh Markazi", "Uzbek", 30),
            Restaurant::new("rest-2", "Pizza Palace", "Italian", 20),
        ]
    }
}
