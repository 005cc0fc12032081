//! Geofence and behaviour monitor.
//!
//! Maps the resident's position to a named circular safe zone and scores
//! behavioural anomaly. The zone table is immutable at runtime; a reload
//! swaps the whole table atomically.

use crate::config::ZoneConfig;
use crate::pipeline::messages::Location;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Zone id reported when the position is in no safe zone.
pub const OUTSIDE_SAFE_ZONES: &str = "outside_safe_zones";

/// A circular safe zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub center: Location,
    pub radius: f32,
}

impl From<&ZoneConfig> for Zone {
    fn from(cfg: &ZoneConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            center: Location::new(cfg.center[0], cfg.center[1]),
            radius: cfg.radius,
        }
    }
}

/// Geofence status, escalating from safe to emergency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeofenceStatus {
    Safe,
    Warning,
    Violation,
    Emergency,
}

/// One geofence evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct GeofenceAssessment {
    /// Zone id, or [`OUTSIDE_SAFE_ZONES`].
    pub zone_id: String,
    pub status: GeofenceStatus,
    /// Behaviour anomaly score in `[0, 1]`.
    pub anomaly_score: f32,
}

/// Zone lookup and behaviour scoring.
pub struct GeofenceMonitor {
    zones: RwLock<Arc<Vec<Zone>>>,
}

impl GeofenceMonitor {
    #[must_use]
    pub fn new(zones: &[ZoneConfig]) -> Self {
        let table: Vec<Zone> = zones.iter().map(Zone::from).collect();
        Self {
            zones: RwLock::new(Arc::new(table)),
        }
    }

    /// Replace the zone table atomically.
    pub fn reload(&self, zones: &[ZoneConfig]) {
        let table: Vec<Zone> = zones.iter().map(Zone::from).collect();
        info!(zones = table.len(), "geofence zone table reloaded");
        if let Ok(mut guard) = self.zones.write() {
            *guard = Arc::new(table);
        }
    }

    fn table(&self) -> Arc<Vec<Zone>> {
        self.zones
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    /// The first zone containing the position (boundary inclusive).
    #[must_use]
    pub fn zone_of(&self, position: Location) -> Option<String> {
        self.table()
            .iter()
            .find(|zone| position.distance_to(zone.center) <= zone.radius)
            .map(|zone| zone.id.clone())
    }

    /// Evaluate the position against the zone table and the behaviour
    /// context string.
    #[must_use]
    pub fn assess(&self, position: Location, behavior_context: &str) -> GeofenceAssessment {
        match self.zone_of(position) {
            None => GeofenceAssessment {
                zone_id: OUTSIDE_SAFE_ZONES.to_owned(),
                status: GeofenceStatus::Violation,
                anomaly_score: 0.8,
            },
            Some(zone_id) => {
                // Hook for an external behaviour classifier; until one is
                // wired the context string drives a coarse score.
                let anomaly_score = if behavior_context.contains("normal") {
                    0.1
                } else {
                    0.3
                };
                let status = if anomaly_score > 0.7 {
                    GeofenceStatus::Emergency
                } else if anomaly_score > 0.5 {
                    GeofenceStatus::Warning
                } else {
                    GeofenceStatus::Safe
                };
                GeofenceAssessment {
                    zone_id,
                    status,
                    anomaly_score,
                }
            }
        }
    }
}
