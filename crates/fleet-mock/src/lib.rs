//! In-memory implementation of the fleet interface for testing purposes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bluegreen_fleet::{ACTIVE_WEIGHT, FleetController, NodeSet, PASSIVE_WEIGHT};
use tokio::sync::Mutex;

/// A call received by the mock.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FleetCall {
    /// `create_node_set`.
    CreateNodeSet {
        /// Application name.
        app: String,

        /// Slot name.
        slot: String,

        /// Image version.
        image_version: String,
    },

    /// `wait_for_node_set_created`.
    WaitForNodeSetCreated {
        /// Application name.
        app: String,

        /// Slot name.
        slot: String,
    },

    /// `delete_node_set`.
    DeleteNodeSet {
        /// Application name.
        app: String,

        /// Slot name.
        slot: String,
    },

    /// `get_all_node_sets`.
    GetAllNodeSets {
        /// Application name.
        app: String,
    },

    /// `get_node_set_members`.
    GetNodeSetMembers {
        /// Application name.
        app: String,

        /// Slot name.
        slot: String,
    },

    /// `switch_traffic`.
    SwitchTraffic {
        /// Application name.
        app: String,

        /// Slot name.
        slot: String,

        /// Requested weight.
        weight: u8,
    },
}

type Observer = Arc<dyn Fn(&FleetCall) + Send + Sync>;

#[derive(Default)]
struct State {
    calls: Vec<FleetCall>,
    failing_creates: HashSet<String>,
    members: HashMap<String, Vec<String>>,
    node_sets: HashMap<String, Vec<NodeSet>>,
    reject_traffic_switches: bool,
}

impl State {
    fn record(&mut self, call: FleetCall, observer: Option<&Observer>) {
        if let Some(observer) = observer {
            observer(&call);
        }
        self.calls.push(call);
    }

    fn find(&self, app: &str, slot: &str) -> Option<&NodeSet> {
        self.node_sets
            .get(app)?
            .iter()
            .find(|node_set| node_set.name == slot)
    }
}

/// Splits `remainder` over `others` proportionally to their current weights, evenly when they
/// carry none; rounding leftovers go to the first node set.
fn redistribute(others: &mut [&mut NodeSet], remainder: u8) {
    if others.is_empty() {
        return;
    }

    let total: u32 = others
        .iter()
        .map(|node_set| u32::from(node_set.weight_percent))
        .sum();
    let count = u32::try_from(others.len()).unwrap_or(u32::MAX);

    let mut assigned = 0;
    for node_set in others.iter_mut() {
        let share = if total == 0 {
            u32::from(remainder) / count
        } else {
            u32::from(remainder) * u32::from(node_set.weight_percent) / total
        };
        node_set.weight_percent = u8::try_from(share).unwrap_or(ACTIVE_WEIGHT);
        assigned += share;
    }

    let leftover = u32::from(remainder).saturating_sub(assigned);
    others[0].weight_percent = others[0]
        .weight_percent
        .saturating_add(u8::try_from(leftover).unwrap_or(0));
}

/// Mock implementation of the fleet controller.
#[derive(Clone, Default)]
pub struct MockFleet {
    observer: Option<Observer>,
    state: Arc<Mutex<State>>,
}

impl Debug for MockFleet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockFleet").finish_non_exhaustive()
    }
}

impl MockFleet {
    /// Creates a mock without node sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `observer` with every call before it is applied.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&FleetCall) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Hosts a node set created in `slot` will consist of.
    pub async fn register_members<I, S>(&self, slot: &str, hosts: I)
    where
        I: IntoIterator<Item = S> + Send,
        I::IntoIter: Send,
        S: Into<String>,
    {
        self.state
            .lock()
            .await
            .members
            .insert(slot.to_string(), hosts.into_iter().map(Into::into).collect());
    }

    /// Adds an existing node set without recording a call.
    pub async fn seed_node_set(&self, app: &str, node_set: NodeSet) {
        self.state
            .lock()
            .await
            .node_sets
            .entry(app.to_string())
            .or_default()
            .push(node_set);
    }

    /// Makes every later attempt to create a node set in `slot` fail.
    pub async fn fail_create(&self, slot: &str) {
        self.state
            .lock()
            .await
            .failing_creates
            .insert(slot.to_string());
    }

    /// Makes every later traffic switch report that the weight was not applied.
    pub async fn reject_traffic_switches(&self) {
        self.state.lock().await.reject_traffic_switches = true;
    }

    /// Current node sets of the application.
    pub async fn node_sets(&self, app: &str) -> Vec<NodeSet> {
        self.state
            .lock()
            .await
            .node_sets
            .get(app)
            .cloned()
            .unwrap_or_default()
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<FleetCall> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl FleetController for MockFleet {
    type Error = Error;

    async fn create_node_set(
        &self,
        app: &str,
        slot: &str,
        image_version: &str,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            FleetCall::CreateNodeSet {
                app: app.to_string(),
                slot: slot.to_string(),
                image_version: image_version.to_string(),
            },
            self.observer.as_ref(),
        );

        if state.failing_creates.contains(slot) || state.find(app, slot).is_some() {
            return Err(Error::CreationFailed(slot.to_string()));
        }

        let mut nodes = state.members.get(slot).cloned().unwrap_or_default();
        nodes.sort();

        state
            .node_sets
            .entry(app.to_string())
            .or_default()
            .push(NodeSet {
                name: slot.to_string(),
                nodes,
                weight_percent: PASSIVE_WEIGHT,
            });

        Ok(())
    }

    async fn wait_for_node_set_created(
        &self,
        app: &str,
        slot: &str,
        _timeout: Duration,
        _poll_interval: Duration,
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            FleetCall::WaitForNodeSetCreated {
                app: app.to_string(),
                slot: slot.to_string(),
            },
            self.observer.as_ref(),
        );

        match state.find(app, slot) {
            Some(_) => Ok(()),
            None => Err(Error::CreationTimeout(slot.to_string())),
        }
    }

    async fn delete_node_set(&self, app: &str, slot: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            FleetCall::DeleteNodeSet {
                app: app.to_string(),
                slot: slot.to_string(),
            },
            self.observer.as_ref(),
        );

        if let Some(node_sets) = state.node_sets.get_mut(app) {
            node_sets.retain(|node_set| node_set.name != slot);
        }

        Ok(())
    }

    async fn get_all_node_sets(&self, app: &str) -> Result<Vec<NodeSet>, Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            FleetCall::GetAllNodeSets {
                app: app.to_string(),
            },
            self.observer.as_ref(),
        );

        Ok(state.node_sets.get(app).cloned().unwrap_or_default())
    }

    async fn get_node_set_members(
        &self,
        app: &str,
        slot: &str,
    ) -> Result<Vec<String>, Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            FleetCall::GetNodeSetMembers {
                app: app.to_string(),
                slot: slot.to_string(),
            },
            self.observer.as_ref(),
        );

        let mut nodes = state
            .find(app, slot)
            .map(|node_set| node_set.nodes.clone())
            .unwrap_or_default();
        nodes.sort();

        Ok(nodes)
    }

    async fn switch_traffic(&self, app: &str, slot: &str, weight: u8) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            FleetCall::SwitchTraffic {
                app: app.to_string(),
                slot: slot.to_string(),
                weight,
            },
            self.observer.as_ref(),
        );

        let current = state
            .find(app, slot)
            .ok_or_else(|| Error::UnknownNodeSet(slot.to_string()))?
            .weight_percent;

        if state.reject_traffic_switches {
            return Err(Error::TrafficSwitchFailed {
                slot: slot.to_string(),
                weight,
            });
        }

        if current == weight {
            return Err(Error::TrafficUnchanged {
                slot: slot.to_string(),
                weight,
            });
        }

        let weight = weight.min(ACTIVE_WEIGHT);
        let node_sets = state.node_sets.entry(app.to_string()).or_default();
        let mut others = Vec::new();
        for node_set in node_sets.iter_mut() {
            if node_set.name == slot {
                node_set.weight_percent = weight;
            } else {
                others.push(node_set);
            }
        }
        redistribute(&mut others, ACTIVE_WEIGHT - weight);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bluegreen_fleet::{FleetError, FleetErrorKind};

    use super::*;

    async fn two_slots() -> MockFleet {
        let fleet = MockFleet::new();
        fleet
            .seed_node_set(
                "search",
                NodeSet {
                    name: "A".to_string(),
                    nodes: vec!["10.0.0.1".to_string()],
                    weight_percent: 100,
                },
            )
            .await;
        fleet.register_members("B", ["10.0.1.2", "10.0.1.1"]).await;
        fleet
    }

    #[tokio::test]
    async fn test_created_node_set_is_passive_with_registered_members() {
        let fleet = two_slots().await;

        fleet.create_node_set("search", "B", "2.0").await.unwrap();

        assert_eq!(
            fleet.get_active_node_set("search").await.unwrap().as_deref(),
            Some("A")
        );
        assert_eq!(
            fleet.get_passive_node_set("search").await.unwrap().as_deref(),
            Some("B")
        );
        assert_eq!(
            fleet.get_node_set_members("search", "B").await.unwrap(),
            vec!["10.0.1.1", "10.0.1.2"]
        );
    }

    #[tokio::test]
    async fn test_switch_drains_other_slot() {
        let fleet = two_slots().await;
        fleet.create_node_set("search", "B", "2.0").await.unwrap();

        fleet.switch_traffic("search", "B", 100).await.unwrap();

        let weights: Vec<(String, u8)> = fleet
            .node_sets("search")
            .await
            .into_iter()
            .map(|node_set| (node_set.name, node_set.weight_percent))
            .collect();
        assert_eq!(
            weights,
            vec![("A".to_string(), 0), ("B".to_string(), 100)]
        );

        let error = fleet.switch_traffic("search", "B", 100).await.unwrap_err();
        assert_eq!(error.kind(), FleetErrorKind::TrafficUnchanged);
    }

    #[test]
    fn test_redistribute_evenly() {
        let mut a = NodeSet {
            name: "A".to_string(),
            nodes: Vec::new(),
            weight_percent: 0,
        };
        let mut b = a.clone();
        b.name = "B".to_string();

        redistribute(&mut [&mut a, &mut b], 75);

        assert_eq!(a.weight_percent + b.weight_percent, 75);
        assert_eq!(a.weight_percent, 38);
    }

    #[tokio::test]
    async fn test_failures() {
        let fleet = two_slots().await;
        fleet.fail_create("B").await;

        let error = fleet.create_node_set("search", "B", "2.0").await.unwrap_err();
        assert_eq!(error.kind(), FleetErrorKind::CreationFailed);

        let error = fleet
            .wait_for_node_set_created("search", "B", Duration::ZERO, Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(error.kind(), FleetErrorKind::CreationTimeout);

        fleet.reject_traffic_switches().await;
        let error = fleet.switch_traffic("search", "A", 0).await.unwrap_err();
        assert_eq!(error.kind(), FleetErrorKind::TrafficSwitchFailed);

        let error = fleet.switch_traffic("search", "C", 0).await.unwrap_err();
        assert_eq!(error.kind(), FleetErrorKind::Other);
    }

    #[tokio::test]
    async fn test_delete_and_observer() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let fleet = two_slots()
            .await
            .with_observer(move |call| sink.lock().unwrap().push(call.clone()));

        fleet.delete_node_set("search", "A").await.unwrap();

        assert!(fleet.node_sets("search").await.is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(fleet.calls().await, seen.lock().unwrap().clone());
    }
}
