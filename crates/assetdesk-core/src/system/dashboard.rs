//! # Dashboard Metrics
//!
//! Counts for the status page and the `status` command. Everything is
//! derived from the registry on demand; nothing here is stored.

use crate::allocation::{AllocationKind, AllocationState};
use crate::asset::{AssetClass, AssetState};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Asset register figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetrics {
    pub total: usize,
    /// Bound to at least one holder.
    pub allocated: usize,
    /// Free and not scrapped.
    pub unallocated: usize,
    pub scrapped: usize,
    /// Flagged damaged or missing by a checklist.
    pub flagged: usize,
    /// Total per register class, keyed by class name.
    pub by_class: BTreeMap<String, usize>,
    /// Sum of asset costs, in cents.
    pub value_cents: i64,
}

/// Camp figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMetrics {
    pub total: usize,
    /// Rooms with at least one occupant.
    pub occupied: usize,
    pub vacant: usize,
    pub full: usize,
    pub beds: u64,
    pub occupied_beds: u64,
}

/// Everything shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskMetrics {
    pub assets: AssetMetrics,
    pub rooms: RoomMetrics,
    /// Allocation count per kind, then per state.
    pub allocations: BTreeMap<String, BTreeMap<String, usize>>,
    pub pending_checklists: usize,
    pub open_follow_ups: usize,
    pub open_maintenance: usize,
    pub open_tickets: usize,
    pub queued_notifications: usize,
}

impl DeskMetrics {
    #[must_use]
    pub fn collect(registry: &Registry) -> Self {
        let mut assets = AssetMetrics::default();
        for class in AssetClass::ALL {
            assets.by_class.insert(class.name().to_string(), 0);
        }
        for asset in registry.assets.values() {
            assets.total += 1;
            if asset.is_bound() {
                assets.allocated += 1;
            } else if asset.state != AssetState::Scrap {
                assets.unallocated += 1;
            }
            match asset.state {
                AssetState::Scrap => assets.scrapped += 1,
                AssetState::Damaged | AssetState::Missing => assets.flagged += 1,
                _ => {}
            }
            *assets
                .by_class
                .entry(asset.class.name().to_string())
                .or_insert(0) += 1;
            assets.value_cents = assets.value_cents.saturating_add(asset.cost_cents);
        }

        let mut rooms = RoomMetrics::default();
        for room in registry.rooms.values() {
            let occupancy = room.occupancy();
            rooms.total += 1;
            if room.is_empty() {
                rooms.vacant += 1;
            } else {
                rooms.occupied += 1;
            }
            rooms.beds += u64::from(room.capacity);
            rooms.occupied_beds += u64::from(occupancy.occupied);
            if occupancy.is_full {
                rooms.full += 1;
            }
        }

        let mut allocations: BTreeMap<String, BTreeMap<String, usize>> = AllocationKind::ALL
            .iter()
            .map(|kind| {
                let states = AllocationState::ALL
                    .iter()
                    .map(|s| (s.name().to_string(), 0))
                    .collect();
                (kind.name().to_string(), states)
            })
            .collect();
        for record in registry.allocations.values() {
            if let Some(states) = allocations.get_mut(record.kind().name()) {
                *states.entry(record.state().name().to_string()).or_insert(0) += 1;
            }
        }

        Self {
            assets,
            rooms,
            allocations,
            pending_checklists: registry
                .checklists
                .values()
                .filter(|c| c.is_pending())
                .count(),
            open_follow_ups: registry.follow_ups.values().filter(|f| f.is_open()).count(),
            open_maintenance: registry
                .maintenance
                .requests
                .values()
                .filter(|r| r.state.is_open())
                .count(),
            open_tickets: registry
                .tickets
                .values()
                .filter(|t| t.state != crate::ticket::TicketState::Closed)
                .count(),
            queued_notifications: registry.outbox.len(),
        }
    }
}
