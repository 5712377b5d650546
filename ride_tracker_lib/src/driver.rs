use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Driver {
    pub driver_id: String,
    pub name: String,
    pub car_model: String,
    pub license_plate: String,
    pub city: String,
}
