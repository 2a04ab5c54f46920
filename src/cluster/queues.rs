//! Batch queue catalog

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use super::RemoteCluster;

/// A batch queue and its wall-time limit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueueDescriptor {
    /// Queue name
    pub name: &'static str,
    /// Maximum wall time in hours
    pub max_wall_hours: f64,
    /// Owning cluster
    pub cluster: RemoteCluster,
    /// Whether the planner may pick this queue on its own
    pub auto_select: bool,
}

/// Outcome of looking up a queue name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueueLookup {
    /// Queue is in the catalog
    Known(&'static QueueDescriptor),
    /// Reservation queue (`R` followed by digits); limits are not checked
    Reserved,
    /// Not in the catalog
    Unknown,
}

static NAS_QUEUES: [QueueDescriptor; 5] = [
    QueueDescriptor {
        name: "low",
        max_wall_hours: 4.0,
        cluster: RemoteCluster::Nas,
        auto_select: true,
    },
    QueueDescriptor {
        name: "normal",
        max_wall_hours: 8.0,
        cluster: RemoteCluster::Nas,
        auto_select: true,
    },
    QueueDescriptor {
        name: "long",
        max_wall_hours: 120.0,
        cluster: RemoteCluster::Nas,
        auto_select: true,
    },
    QueueDescriptor {
        name: "devel",
        max_wall_hours: 2.0,
        cluster: RemoteCluster::Nas,
        auto_select: false,
    },
    QueueDescriptor {
        name: "debug",
        max_wall_hours: 2.0,
        cluster: RemoteCluster::Nas,
        auto_select: false,
    },
];

static AWS_QUEUES: [QueueDescriptor; 1] = [QueueDescriptor {
    name: "cloud",
    max_wall_hours: f64::INFINITY,
    cluster: RemoteCluster::Aws,
    auto_select: true,
}];

/// Reservation queues are named `R` followed by the reservation number.
static RESERVED_QUEUE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^R\d+$").unwrap());

/// All queues for a cluster
pub fn queues(cluster: RemoteCluster) -> &'static [QueueDescriptor] {
    match cluster {
        RemoteCluster::Nas => &NAS_QUEUES,
        RemoteCluster::Aws => &AWS_QUEUES,
    }
}

/// Auto-selectable queues ordered by ascending max wall time
pub fn auto_select_queues(cluster: RemoteCluster) -> Vec<&'static QueueDescriptor> {
    let mut list: Vec<_> = queues(cluster).iter().filter(|q| q.auto_select).collect();
    list.sort_by(|a, b| a.max_wall_hours.total_cmp(&b.max_wall_hours));
    list
}

/// Smallest auto-selectable queue whose limit covers `wall_hours`
pub fn queue_for_wall_time(cluster: RemoteCluster, wall_hours: f64) -> Option<&'static QueueDescriptor> {
    auto_select_queues(cluster)
        .into_iter()
        .find(|q| q.max_wall_hours >= wall_hours)
}

/// Whether `name` is a reservation queue
pub fn is_reserved_queue(name: &str) -> bool {
    RESERVED_QUEUE_REGEX.is_match(name)
}

/// Look up a queue name
pub fn lookup_queue(cluster: RemoteCluster, name: &str) -> QueueLookup {
    if is_reserved_queue(name) {
        return QueueLookup::Reserved;
    }
    match queues(cluster).iter().find(|q| q.name == name) {
        Some(q) => QueueLookup::Known(q),
        None => QueueLookup::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_select_order() {
        let names: Vec<_> = auto_select_queues(RemoteCluster::Nas)
            .iter()
            .map(|q| q.name)
            .collect();
        assert_eq!(names, vec!["low", "normal", "long"]);
    }

    #[test]
    fn test_queue_for_wall_time() {
        assert_eq!(queue_for_wall_time(RemoteCluster::Nas, 0.5).unwrap().name, "low");
        assert_eq!(queue_for_wall_time(RemoteCluster::Nas, 4.0).unwrap().name, "low");
        assert_eq!(queue_for_wall_time(RemoteCluster::Nas, 4.25).unwrap().name, "normal");
        assert_eq!(queue_for_wall_time(RemoteCluster::Nas, 50.0).unwrap().name, "long");
        assert!(queue_for_wall_time(RemoteCluster::Nas, 500.0).is_none());
        assert_eq!(queue_for_wall_time(RemoteCluster::Aws, 500.0).unwrap().name, "cloud");
    }

    #[test]
    fn test_lookup_queue() {
        assert_eq!(lookup_queue(RemoteCluster::Nas, "R14950266"), QueueLookup::Reserved);
        assert_eq!(lookup_queue(RemoteCluster::Nas, "R14x"), QueueLookup::Unknown);
        assert_eq!(lookup_queue(RemoteCluster::Nas, "special"), QueueLookup::Unknown);
        match lookup_queue(RemoteCluster::Nas, "devel") {
            QueueLookup::Known(q) => assert!(!q.auto_select),
            other => panic!("unexpected lookup {:?}", other),
        }
    }
}
