//! Core types for trip engine

use chrono::{DateTime, Utc};
use ledger_core::{AccountId, Collection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Record collection holding devices
pub const DEVICES: Collection = Collection::new("devices");

/// Record collection holding trips
pub const TRIPS: Collection = Collection::new("trips");

/// Kind of submitting hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// Phone app
    Smartphone,
    /// Wearable
    FitnessTracker,
    /// Bike-mounted computer
    BikeComputer,
    /// Vehicle head unit
    EvOnboard,
    /// OBD-II dongle
    ObdModule,
}

/// Registered device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Device ID
    pub id: Uuid,

    /// Owning account
    pub owner: AccountId,

    /// Hardware kind
    pub device_type: DeviceType,

    /// Globally unique hardware identifier, immutable once registered
    pub identifier: String,

    /// Display name
    pub name: String,

    /// Registration time
    pub registered_at: DateTime<Utc>,

    /// Last accepted submission (or registration)
    pub last_active_at: DateTime<Utc>,

    /// Whether submissions are accepted
    pub active: bool,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDevice {
    /// Owning account
    pub owner: AccountId,
    /// Hardware kind
    pub device_type: DeviceType,
    /// Hardware identifier
    pub identifier: String,
    /// Display name
    pub name: String,
}

/// Transport mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    /// On foot
    Walking,
    /// Bicycle
    Cycling,
    /// Bus, tram, train
    PublicTransport,
    /// Electric car or scooter
    ElectricVehicle,
}

impl TransportMode {
    /// All modes
    pub const ALL: [TransportMode; 4] = [
        TransportMode::Walking,
        TransportMode::Cycling,
        TransportMode::PublicTransport,
        TransportMode::ElectricVehicle,
    ];
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Walking => write!(f, "WALKING"),
            TransportMode::Cycling => write!(f, "CYCLING"),
            TransportMode::PublicTransport => write!(f, "PUBLIC_TRANSPORT"),
            TransportMode::ElectricVehicle => write!(f, "ELECTRIC_VEHICLE"),
        }
    }
}

/// Raw submission from a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripSubmission {
    /// Submitting device
    pub device_id: Uuid,
    /// Start location label
    pub start_location: String,
    /// End location label
    pub end_location: String,
    /// Distance in km
    pub distance_km: Decimal,
    /// Transport mode
    pub mode: TransportMode,
    /// Duration in minutes
    pub duration_minutes: u32,
    /// Trip start
    pub started_at: DateTime<Utc>,
    /// Trip end
    pub ended_at: DateTime<Utc>,
}

/// Trip lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    /// Awaiting verification
    Pending,
    /// Rewarded (terminal)
    Verified,
    /// Refused (terminal)
    Rejected,
}

impl TripStatus {
    /// Whether the trip can no longer change
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TripStatus::Pending)
    }
}

/// Why a trip was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    /// Device exceeded its submission ceiling in the rate window
    RateLimited {
        /// Position of this trip among the device's submissions in the window
        rank: u32,
        /// Configured ceiling
        ceiling: u32,
    },
    /// Attestation said the trip is not genuine
    NotGenuine,
    /// Attestation confidence below the configured minimum
    LowConfidence {
        /// Reported confidence
        confidence: f64,
        /// Configured minimum
        minimum: f64,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::RateLimited { rank, ceiling } => {
                write!(f, "submission {} exceeds ceiling {} in rate window", rank, ceiling)
            }
            RejectionReason::NotGenuine => write!(f, "attestation reported trip as not genuine"),
            RejectionReason::LowConfidence { confidence, minimum } => {
                write!(f, "attestation confidence {:.2} below minimum {:.2}", confidence, minimum)
            }
        }
    }
}

/// Trip record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Trip ID (also the EARN entry reference)
    pub id: Uuid,

    /// Owning account (the device owner)
    pub account_id: AccountId,

    /// Submitting device
    pub device_id: Uuid,

    /// Start location label
    pub start_location: String,

    /// End location label
    pub end_location: String,

    /// Distance in km
    pub distance_km: Decimal,

    /// Transport mode
    pub mode: TransportMode,

    /// Duration in minutes
    pub duration_minutes: u32,

    /// Trip start
    pub started_at: DateTime<Utc>,

    /// Trip end
    pub ended_at: DateTime<Utc>,

    /// When the submission was accepted
    pub submitted_at: DateTime<Utc>,

    /// Hex SHA-256 of (device, start, end)
    pub idempotency_key: String,

    /// Position among the device's submissions in the rate window (1-based)
    pub window_rank: u32,

    /// Lifecycle status
    pub status: TripStatus,

    /// CO₂ saved in kg, set on verification
    pub co2_saved_kg: Option<Decimal>,

    /// Tokens credited, set on verification
    pub tokens_earned: Option<Decimal>,

    /// Set once, on leaving PENDING
    pub verified_at: Option<DateTime<Utc>>,

    /// Set when REJECTED
    pub rejection: Option<RejectionReason>,
}

/// Signal from the attestation collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Device and location integrity check passed
    pub genuine: bool,
    /// Confidence in [0, 1]
    pub confidence: f64,
}
