//! Fleet API wire format and domain entities.

use serde::{Deserialize, Serialize};

pub type UserId = i32;
pub type VehicleId = i32;

/// Generic fleet API response envelope.
#[derive(Deserialize)]
pub struct Response<T> {
    pub data: T,
}

/// Raw roster record. The feed pads the list with zero-id filler records,
/// hence all the defaults.
#[derive(Deserialize)]
pub struct UserEntry {
    #[serde(default)]
    pub userid: UserId,

    #[serde(default)]
    pub owner: OwnerEntry,

    #[serde(default)]
    pub vehicles: Vec<VehicleEntry>,
}

#[derive(Deserialize, Default)]
pub struct OwnerEntry {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub surname: String,

    #[serde(default)]
    pub foto: String,
}

#[derive(Deserialize)]
pub struct VehicleEntry {
    pub vehicleid: VehicleId,

    #[serde(default)]
    pub make: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub year: String,

    #[serde(default)]
    pub color: String,

    #[serde(default)]
    pub vin: String,

    #[serde(default)]
    pub foto: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub photo: String,
    pub vehicles: Vec<Vehicle>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub make: String,
    pub model: String,
    pub year: String,
    pub color: String,
    pub vin: String,
    pub photo: String,
}

/// One vehicle's position as returned by the locations endpoint.
/// Overwritten on every poll tick, never persisted beyond the location cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VehicleLocation {
    #[serde(rename = "vehicleid")]
    pub vehicle_id: VehicleId,

    pub lat: f64,
    pub lon: f64,
}

impl From<UserEntry> for User {
    fn from(entry: UserEntry) -> Self {
        Self {
            id: entry.userid,
            name: entry.owner.name,
            surname: entry.owner.surname,
            photo: entry.owner.foto,
            vehicles: entry.vehicles.into_iter().map(Vehicle::from).collect(),
        }
    }
}

impl From<VehicleEntry> for Vehicle {
    fn from(entry: VehicleEntry) -> Self {
        Self {
            id: entry.vehicleid,
            make: entry.make,
            model: entry.model,
            year: entry.year,
            color: entry.color,
            vin: entry.vin,
            photo: entry.foto,
        }
    }
}

/// Converts raw roster records into users, dropping the zero-id fillers.
pub fn normalize_users(entries: Vec<UserEntry>) -> Vec<User> {
    entries
        .into_iter()
        .filter(|entry| entry.userid != 0)
        .map(User::from)
        .collect()
}
