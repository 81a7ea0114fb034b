//! Async runtime for the gathering engine
//!
//! A single task owns the [`GatherSessionController`]. Player actions arrive
//! as [`GatherCommand`]s from any number of [`GatherHandle`]s; continuations
//! and discovery results come back through an internal channel, so the
//! controller is only ever touched from one place:
//!
//! ```text
//!   GatherHandle ──cmd──►┐
//!                        ├──► service task ──► controller ──► effects
//!   sleep / gateway ────►┘         │                              │
//!        ▲                         └──► broadcast<GatherEvent>    │
//!        └────────────────── spawned per effect ◄─────────────────┘
//! ```

use std::sync::Arc;

use forage_types::{ElementId, ResourceId};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;
use crate::error::ValidationError;
use crate::events::GatherEvent;
use crate::gateway::{DiscoveryGateway, DiscoveryResponse, GatewayError};
use crate::gather::{Continuation, Effect, GatherSessionController, GatherView, Wake};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("gather service is not running")]
    Closed,
    #[error(transparent)]
    Rejected(#[from] ValidationError),
}

/// A player action. Replies with the controller's verdict.
#[derive(Debug, Clone)]
pub enum GatherAction {
    SelectResource(ResourceId),
    ToggleElement(ElementId),
    AddElement(ElementId),
    RemoveElement(ElementId),
    ClearSelection,
    ToggleAutoMember(ResourceId),
    StartOrStopAuto,
}

type ActionReply = oneshot::Sender<Result<bool, ValidationError>>;

pub enum GatherCommand {
    Action(GatherAction, ActionReply),
    Snapshot(oneshot::Sender<GatherView>),
    Catalog(oneshot::Sender<Catalog>),
    Shutdown,
}

/// Results of spawned work, fed back into the service loop
enum Callback {
    Wake(Wake, CancellationToken),
    Discovered {
        resource: ResourceId,
        token: CancellationToken,
        result: Result<DiscoveryResponse, GatewayError>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Service Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to drive the gather service from UI code
#[derive(Clone)]
pub struct GatherHandle {
    cmd_tx: mpsc::Sender<GatherCommand>,
    events: broadcast::Sender<GatherEvent>,
}

impl GatherHandle {
    /// Receive every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GatherEvent> {
        self.events.subscribe()
    }

    /// Returns whether a resource is selected afterwards. Re-selecting the
    /// active resource deselects it.
    pub async fn select_resource(&self, resource: impl Into<ResourceId>) -> Result<bool, ServiceError> {
        self.act(GatherAction::SelectResource(resource.into())).await
    }

    /// Returns whether the element is selected afterwards
    pub async fn toggle_element(&self, element: impl Into<ElementId>) -> Result<bool, ServiceError> {
        self.act(GatherAction::ToggleElement(element.into())).await
    }

    pub async fn add_element(&self, element: impl Into<ElementId>) -> Result<(), ServiceError> {
        self.act(GatherAction::AddElement(element.into()))
            .await
            .map(|_| ())
    }

    /// Returns false if the element wasn't selected
    pub async fn remove_element(&self, element: impl Into<ElementId>) -> Result<bool, ServiceError> {
        self.act(GatherAction::RemoveElement(element.into())).await
    }

    pub async fn clear_selection(&self) -> Result<(), ServiceError> {
        self.act(GatherAction::ClearSelection).await.map(|_| ())
    }

    /// Returns true if the resource joined the auto-gather set
    pub async fn toggle_auto_member(
        &self,
        resource: impl Into<ResourceId>,
    ) -> Result<bool, ServiceError> {
        self.act(GatherAction::ToggleAutoMember(resource.into())).await
    }

    /// Returns whether auto-gather is running afterwards
    pub async fn start_or_stop_auto(&self) -> Result<bool, ServiceError> {
        self.act(GatherAction::StartOrStopAuto).await
    }

    pub async fn snapshot(&self) -> Result<GatherView, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.send(GatherCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Current catalog, including discoveries made this session
    pub async fn catalog(&self) -> Result<Catalog, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.send(GatherCommand::Catalog(tx)).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Stop auto-gather and end the service task
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.send(GatherCommand::Shutdown).await
    }

    async fn act(&self, action: GatherAction) -> Result<bool, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.send(GatherCommand::Action(action, tx)).await?;
        Ok(rx.await.map_err(|_| ServiceError::Closed)??)
    }

    async fn send(&self, cmd: GatherCommand) -> Result<(), ServiceError> {
        self.cmd_tx.send(cmd).await.map_err(|_| ServiceError::Closed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

pub struct GatherService<G: DiscoveryGateway> {
    controller: GatherSessionController,
    gateway: Arc<G>,
    cmd_rx: mpsc::Receiver<GatherCommand>,
    callback_tx: mpsc::UnboundedSender<Callback>,
    callback_rx: mpsc::UnboundedReceiver<Callback>,
}

impl<G: DiscoveryGateway> GatherService<G> {
    pub fn new(mut controller: GatherSessionController, gateway: Arc<G>) -> (Self, GatherHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (callback_tx, callback_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        controller.subscribe(Box::new(events.clone()));

        let service = Self {
            controller,
            gateway,
            cmd_rx,
            callback_tx,
            callback_rx,
        };
        (service, GatherHandle { cmd_tx, events })
    }

    /// Create the service and run it on the current tokio runtime
    pub fn spawn(controller: GatherSessionController, gateway: Arc<G>) -> (GatherHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(controller, gateway);
        (handle, tokio::spawn(service.run()))
    }

    /// Process commands until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!("Gather service started");
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(GatherCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(callback) = self.callback_rx.recv() => self.handle_callback(callback),
            }
            self.dispatch_effects();
        }

        // Anything still sleeping is either cancelled here or lands in a closed channel
        self.controller.stop_auto();
        tracing::debug!("Gather service stopped");
    }

    fn handle_command(&mut self, cmd: GatherCommand) {
        match cmd {
            GatherCommand::Action(action, reply) => {
                let result = self.apply(action);
                let _ = reply.send(result);
            }
            GatherCommand::Snapshot(reply) => {
                let _ = reply.send(self.controller.view());
            }
            GatherCommand::Catalog(reply) => {
                let _ = reply.send(self.controller.catalog().clone());
            }
            GatherCommand::Shutdown => {}
        }
    }

    fn apply(&mut self, action: GatherAction) -> Result<bool, ValidationError> {
        let c = &mut self.controller;
        match action {
            GatherAction::SelectResource(id) => {
                c.select_resource(&id)?;
                Ok(c.workbench().session().is_some())
            }
            GatherAction::ToggleElement(id) => c.toggle_element(&id),
            GatherAction::AddElement(id) => c.add_element(&id).map(|_| true),
            GatherAction::RemoveElement(id) => c.remove_element(&id),
            GatherAction::ClearSelection => c.clear_selection().map(|_| true),
            GatherAction::ToggleAutoMember(id) => c.toggle_auto_member(&id),
            GatherAction::StartOrStopAuto => c.start_or_stop_auto(),
        }
    }

    fn handle_callback(&mut self, callback: Callback) {
        match callback {
            Callback::Wake(wake, token) => self.controller.wake(wake, &token),
            Callback::Discovered {
                resource,
                token,
                result,
            } => {
                self.controller.resolve_discovery(&resource, &token, result);
            }
        }
    }

    fn dispatch_effects(&mut self) {
        for effect in self.controller.take_effects() {
            match effect {
                Effect::Schedule(Continuation { delay, token, wake }) => {
                    let tx = self.callback_tx.clone();
                    let cancelled = token.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = cancelled.cancelled() => {}
                            _ = tokio::time::sleep(delay) => {
                                let _ = tx.send(Callback::Wake(wake, token));
                            }
                        }
                    });
                }
                Effect::Discover {
                    resource,
                    character,
                    token,
                } => {
                    tracing::debug!(%resource, %character, "Requesting discovery");
                    let gateway = Arc::clone(&self.gateway);
                    let tx = self.callback_tx.clone();
                    tokio::spawn(async move {
                        let result = gateway.discover(&resource, &character).await;
                        let _ = tx.send(Callback::Discovered {
                            resource,
                            token,
                            result,
                        });
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use forage_types::{CharacterId, GatherTiming, Rarity};
    use tokio::sync::broadcast::error::RecvError;

    use super::*;
    use crate::catalog::{Element, Resource};
    use crate::gateway::LocalDiscoveryGateway;

    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicUsize,
    }

    impl DiscoveryGateway for CountingGateway {
        async fn discover(
            &self,
            _resource: &ResourceId,
            _character: &CharacterId,
        ) -> Result<DiscoveryResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(DiscoveryResponse::ok())
        }
    }

    fn catalog() -> Catalog {
        let elements = ["fire", "earth", "water"]
            .iter()
            .map(|id| Element {
                id: ElementId::from(*id),
                icon: id.to_string(),
                color: "#ffffff".to_string(),
            })
            .collect();
        let resource = |id: &str, combo: [&str; 2], discovered| Resource {
            id: ResourceId::from(id),
            name: id.to_string(),
            rarity: Rarity::Common,
            required_combination: combo.iter().map(|e| ElementId::from(*e)).collect(),
            discovered,
        };
        Catalog::new(
            elements,
            vec![
                resource("iron_ore", ["fire", "earth"], false),
                resource("clay", ["earth", "water"], true),
                resource("steam", ["fire", "water"], true),
            ],
        )
    }

    fn spawn_with<G: DiscoveryGateway>(gateway: Arc<G>) -> (GatherHandle, JoinHandle<()>) {
        let controller = GatherSessionController::new(
            catalog(),
            CharacterId::from("tester"),
            GatherTiming::default(),
        );
        GatherService::spawn(controller, gateway)
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<GatherEvent>,
        pred: impl Fn(&GatherEvent) -> bool,
    ) -> GatherEvent {
        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(event) if pred(&event) => return event,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => panic!("event stream closed"),
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(60), wait)
            .await
            .expect("event never arrived")
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_gather_end_to_end() {
        let gateway = Arc::new(CountingGateway::default());
        let (handle, task) = spawn_with(Arc::clone(&gateway));
        let mut rx = handle.subscribe();

        assert!(handle.select_resource("iron_ore").await.unwrap());
        assert!(handle.toggle_element("earth").await.unwrap());
        assert!(handle.toggle_element("fire").await.unwrap());
        assert!(handle.snapshot().await.unwrap().running);

        let event = wait_for(&mut rx, |e| matches!(e, GatherEvent::ResourceGathered { .. })).await;
        assert!(matches!(
            event,
            GatherEvent::ResourceGathered {
                newly_discovered: true,
                auto: false,
                ..
            }
        ));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        // The combination is now fixed
        handle.select_resource("iron_ore").await.unwrap();
        let err = handle.toggle_element("fire").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(ValidationError::AlreadyDiscovered(_))
        ));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselect_reports_deselection() {
        let (handle, task) = spawn_with(Arc::new(LocalDiscoveryGateway::new()));

        assert!(handle.select_resource("iron_ore").await.unwrap());
        assert!(handle.toggle_element("fire").await.unwrap());
        assert!(!handle.select_resource("iron_ore").await.unwrap());

        let view = handle.snapshot().await.unwrap();
        assert_eq!(view.target, None);
        assert!(view.selected.is_empty());

        assert!(handle.select_resource("clay").await.unwrap());
        assert!(handle.select_resource("iron_ore").await.unwrap());
        assert_eq!(
            handle.snapshot().await.unwrap().target,
            Some(ResourceId::from("iron_ore"))
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_gather_stop_reports_stats() {
        let gateway = Arc::new(LocalDiscoveryGateway::new());
        let (handle, task) = spawn_with(Arc::clone(&gateway));
        let mut rx = handle.subscribe();

        assert!(handle.toggle_auto_member("clay").await.unwrap());
        assert!(handle.toggle_auto_member("steam").await.unwrap());
        assert!(handle.start_or_stop_auto().await.unwrap());

        wait_for(&mut rx, |e| matches!(e, GatherEvent::ResourceGathered { .. })).await;
        let view = handle.snapshot().await.unwrap();
        let auto = view.auto.unwrap();
        assert_eq!(auto.stats.count(&ResourceId::from("clay")), 1);
        assert_eq!(auto.queue, vec![ResourceId::from("steam")]);

        assert!(!handle.start_or_stop_auto().await.unwrap());
        let stopped = wait_for(&mut rx, |e| matches!(e, GatherEvent::AutoGatherStopped { .. })).await;
        assert!(matches!(
            stopped,
            GatherEvent::AutoGatherStopped { total_gathered: 1 }
        ));

        // Pending continuations were cancelled with the run
        tokio::time::sleep(Duration::from_secs(30)).await;
        let view = handle.snapshot().await.unwrap();
        assert!(view.auto.is_none());
        assert_eq!(view.target, None);
        assert!(gateway.is_discovered(&ResourceId::from("clay"), &CharacterId::from("tester")));
        let catalog = handle.catalog().await.unwrap();
        assert_eq!(catalog.discovered().count(), 2);
        assert!(!gateway.is_discovered(&ResourceId::from("steam"), &CharacterId::from("tester")));

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejections_reach_caller_and_subscribers() {
        let (handle, task) = spawn_with(Arc::new(LocalDiscoveryGateway::new()));
        let mut rx = handle.subscribe();

        let err = handle.toggle_auto_member("iron_ore").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Rejected(ValidationError::NotDiscovered(_))
        ));
        let event = wait_for(&mut rx, |e| matches!(e, GatherEvent::Rejected(_))).await;
        assert_eq!(
            event.journal_line().as_deref(),
            Some("'iron_ore' must be discovered before it can be auto-gathered")
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_fails_once_service_ends() {
        let (handle, task) = spawn_with(Arc::new(LocalDiscoveryGateway::new()));
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(matches!(
            handle.snapshot().await,
            Err(ServiceError::Closed)
        ));
    }
}
