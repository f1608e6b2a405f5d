use std::collections::{HashMap, HashSet};

use futures::channel::mpsc::UnboundedSender;
use futures::channel::oneshot::Sender as OneshotSender;

use frameoxide_types::runtime::{ExecutionContextId, RemoteObjectId};

use crate::error::{CdpError, Result};
use crate::handler::execution::ContextInfo;
use crate::world::Binding;

/// There are two different kinds of worlds tracked for each `Frame`, that
/// represent a context for JavaScript execution.
///
/// - each frame has a "default" execution context that is always created
///   after the frame is attached to DOM.
/// - the secondary world is an isolated world with universal access that
///   page scripts can't observe or tamper with.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum DOMWorldKind {
    /// The main world of a frame that represents the default execution context
    /// of a frame and is also created.
    #[default]
    Main,
    /// Each frame gets its own isolated world with universal access
    Secondary,
}

/// Identifies a wait task registered with a world
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct WaitTaskId(pub usize);

/// What the handler tells a pending wait task
#[derive(Debug)]
pub(crate) enum WaitTaskSignal {
    /// A new context with the utility injected is ready, run again there
    Rerun(ContextInfo),
    /// The task can never complete
    Terminate(CdpError),
}

/// A caller waiting for a binding to be wired into a context
#[derive(Debug)]
pub(crate) struct BindingCall {
    pub name: String,
    pub context_id: ExecutionContextId,
    pub tx: OneshotSender<()>,
}

/// The binding that is currently being added to a context
#[derive(Debug)]
struct BindingSetup {
    name: String,
    context_id: ExecutionContextId,
    waiters: Vec<OneshotSender<()>>,
}

/// The current context of a world.
///
/// Every change bumps the generation, so results of asynchronous work started
/// for an earlier context can be recognized as stale.
#[derive(Debug, Default)]
pub(crate) struct ContextSlot {
    generation: u64,
    current: Option<ContextInfo>,
    waiters: Vec<OneshotSender<Result<ContextInfo>>>,
}

impl ContextSlot {
    pub fn current(&self) -> Option<&ContextInfo> {
        self.current.as_ref()
    }

    /// Installs a new context and resolves everyone waiting for one
    pub fn set(&mut self, info: ContextInfo) -> u64 {
        self.generation += 1;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(info.clone()));
        }
        self.current = Some(info);
        self.generation
    }

    /// Drops the current context, waiters stay pending until the next `set`
    pub fn clear(&mut self) {
        self.generation += 1;
        self.current = None;
    }

    pub fn wait(&mut self, tx: OneshotSender<Result<ContextInfo>>) {
        match self.current {
            Some(ref info) => {
                let _ = tx.send(Ok(info.clone()));
            }
            None => {
                self.waiters.retain(|w| !w.is_canceled());
                self.waiters.push(tx)
            }
        }
    }

    fn fail(&mut self) {
        self.generation += 1;
        self.current = None;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(CdpError::FrameDetached));
        }
    }
}

/// The handler side of one world of a frame
#[derive(Debug)]
pub(crate) struct DOMWorld {
    kind: DOMWorldKind,
    slot: ContextSlot,
    /// Bindings that have been registered in the current context
    ctx_bindings: HashSet<(String, ExecutionContextId)>,
    /// Every binding a wait task asked for, survives context changes
    bindings: HashMap<String, Binding>,
    /// Only one binding is added at a time
    binding_setup: Option<BindingSetup>,
    /// Calls that arrived while a setup was in flight
    binding_queue: Vec<BindingCall>,
    wait_tasks: HashMap<WaitTaskId, UnboundedSender<WaitTaskSignal>>,
    detached: bool,
}

impl DOMWorld {
    pub fn new(kind: DOMWorldKind) -> Self {
        Self {
            kind,
            slot: Default::default(),
            ctx_bindings: Default::default(),
            bindings: Default::default(),
            binding_setup: None,
            binding_queue: Vec::new(),
            wait_tasks: Default::default(),
            detached: false,
        }
    }

    pub fn main_world() -> Self {
        Self::new(DOMWorldKind::Main)
    }

    pub fn secondary_world() -> Self {
        Self::new(DOMWorldKind::Secondary)
    }

    pub fn context(&self) -> Option<&ContextInfo> {
        self.slot.current()
    }

    pub fn has_context(&self) -> bool {
        self.slot.current().is_some()
    }

    /// Makes `info` the current context and returns its generation
    pub fn set_context(&mut self, info: ContextInfo) -> u64 {
        self.ctx_bindings.clear();
        self.slot.set(info)
    }

    pub fn clear_context(&mut self) {
        self.ctx_bindings.clear();
        self.slot.clear();
    }

    /// Records the injected utility object if `generation` is still the
    /// current one and reruns all wait tasks against the context.
    pub fn set_utility(&mut self, generation: u64, utility: RemoteObjectId) -> bool {
        if self.slot.generation != generation {
            return false;
        }
        match self.slot.current.as_mut() {
            Some(info) => info.utility = Some(utility),
            None => return false,
        }
        self.rerun_wait_tasks();
        true
    }

    fn rerun_wait_tasks(&mut self) {
        if let Some(info) = self.slot.current().filter(|info| info.utility.is_some()) {
            let info = info.clone();
            self.wait_tasks
                .retain(|_, task| task.unbounded_send(WaitTaskSignal::Rerun(info.clone())).is_ok());
        }
    }

    pub fn execution_context(&mut self, tx: OneshotSender<Result<ContextInfo>>) {
        if self.detached {
            let _ = tx.send(Err(CdpError::FrameDetached));
        } else {
            self.slot.wait(tx)
        }
    }

    pub fn add_wait_task(
        &mut self,
        id: WaitTaskId,
        bindings: Vec<Binding>,
        signals: UnboundedSender<WaitTaskSignal>,
    ) {
        if self.detached {
            let _ = signals.unbounded_send(WaitTaskSignal::Terminate(CdpError::FrameDetached));
            return;
        }
        for binding in bindings {
            self.bindings.insert(binding.name().to_string(), binding);
        }
        if let Some(info) = self.slot.current().filter(|info| info.utility.is_some()) {
            let _ = signals.unbounded_send(WaitTaskSignal::Rerun(info.clone()));
        }
        self.wait_tasks.insert(id, signals);
    }

    pub fn remove_wait_task(&mut self, id: WaitTaskId) {
        self.wait_tasks.remove(&id);
    }

    #[cfg(test)]
    pub fn wait_task_count(&self) -> usize {
        self.wait_tasks.len()
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn is_bound(&self, name: &str, context_id: ExecutionContextId) -> bool {
        self.ctx_bindings
            .contains(&(name.to_string(), context_id))
    }

    /// Requests `name` to be wired into `context_id`.
    ///
    /// Returns the binding that needs to be set up remotely if no other setup
    /// is in flight, otherwise the call is parked until that one finishes.
    pub fn begin_binding(
        &mut self,
        name: String,
        context_id: ExecutionContextId,
        tx: OneshotSender<()>,
    ) -> Option<(String, ExecutionContextId)> {
        if self.detached || self.is_bound(&name, context_id) {
            let _ = tx.send(());
            return None;
        }
        if self.binding_setup.is_some() {
            self.binding_queue.push(BindingCall {
                name,
                context_id,
                tx,
            });
            return None;
        }
        self.binding_setup = Some(BindingSetup {
            name: name.clone(),
            context_id,
            waiters: vec![tx],
        });
        Some((name, context_id))
    }

    /// Marks the in flight binding as wired, if its context is still current
    pub fn binding_ready(&mut self, name: &str, context_id: ExecutionContextId) {
        if self.slot.current().map(|c| c.context_id) == Some(context_id) {
            self.ctx_bindings.insert((name.to_string(), context_id));
        }
    }

    /// Completes the in flight setup and hands back every parked call, which
    /// must check again whether their binding is present.
    pub fn finish_binding(&mut self) -> Vec<BindingCall> {
        if let Some(setup) = self.binding_setup.take() {
            tracing::trace!(
                "binding {} finished for context {}",
                setup.name,
                setup.context_id
            );
            for waiter in setup.waiters {
                let _ = waiter.send(());
            }
        }
        std::mem::take(&mut self.binding_queue)
    }

    /// Terminal: fails everything that waits on this world
    pub fn detach(&mut self) {
        tracing::trace!("{:?} world detached", self.kind);
        self.detached = true;
        self.ctx_bindings.clear();
        self.slot.fail();
        for (_, task) in self.wait_tasks.drain() {
            let _ = task.unbounded_send(WaitTaskSignal::Terminate(CdpError::FrameDetached));
        }
        for call in self.finish_binding() {
            let _ = call.tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::frame::FrameKey;
    use futures::channel::mpsc::unbounded;
    use futures::channel::oneshot::channel;
    use frameoxide_types::SessionId;

    fn ctx(id: i64) -> ContextInfo {
        ContextInfo::new(
            SessionId::from("S"),
            ExecutionContextId::new(id),
            FrameKey::new(0),
            DOMWorldKind::Main,
        )
    }

    #[test]
    fn waiters_observe_context_after_clear() {
        let mut world = DOMWorld::main_world();
        world.set_context(ctx(1));
        world.clear_context();

        let (tx, mut rx) = channel();
        world.execution_context(tx);
        assert!(rx.try_recv().unwrap().is_none());

        world.set_context(ctx(2));
        let info = rx.try_recv().unwrap().unwrap().unwrap();
        assert_eq!(info.context_id, ExecutionContextId::new(2));
    }

    #[test]
    fn stale_utility_is_ignored() {
        let mut world = DOMWorld::main_world();
        let (signals, mut rx) = unbounded();
        world.add_wait_task(WaitTaskId(1), Vec::new(), signals);

        let stale = world.set_context(ctx(1));
        world.clear_context();
        let current = world.set_context(ctx(3));
        assert!(!world.set_utility(stale, RemoteObjectId::new("u-1")));
        assert!(rx.try_next().is_err());

        assert!(world.set_utility(current, RemoteObjectId::new("u-3")));
        match rx.try_next().unwrap() {
            Some(WaitTaskSignal::Rerun(info)) => {
                assert_eq!(info.context_id, ExecutionContextId::new(3));
                assert_eq!(info.utility, Some(RemoteObjectId::new("u-3")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn single_binding_setup_in_flight() {
        let mut world = DOMWorld::main_world();
        world.set_context(ctx(1));
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();

        let setup = world.begin_binding("hook".to_string(), ExecutionContextId::new(1), tx1);
        assert_eq!(setup, Some(("hook".to_string(), ExecutionContextId::new(1))));
        assert!(world
            .begin_binding("hook".to_string(), ExecutionContextId::new(1), tx2)
            .is_none());

        world.binding_ready("hook", ExecutionContextId::new(1));
        let parked = world.finish_binding();
        assert_eq!(rx1.try_recv().unwrap(), Some(()));
        assert_eq!(parked.len(), 1);

        // the parked caller checks again and finds the binding present
        let call = parked.into_iter().next().unwrap();
        assert!(world
            .begin_binding(call.name, call.context_id, call.tx)
            .is_none());
        assert_eq!(rx2.try_recv().unwrap(), Some(()));
    }

    #[test]
    fn new_context_requires_rebinding() {
        let mut world = DOMWorld::main_world();
        world.set_context(ctx(1));
        let (tx, _rx) = channel();
        world.begin_binding("hook".to_string(), ExecutionContextId::new(1), tx);
        world.binding_ready("hook", ExecutionContextId::new(1));
        world.finish_binding();
        assert!(world.is_bound("hook", ExecutionContextId::new(1)));

        world.clear_context();
        world.set_context(ctx(1));
        assert!(!world.is_bound("hook", ExecutionContextId::new(1)));
    }

    #[test]
    fn detach_terminates_tasks_and_waiters() {
        let mut world = DOMWorld::secondary_world();
        let (signals, mut tasks) = unbounded();
        world.add_wait_task(WaitTaskId(7), Vec::new(), signals);
        let (tx, mut rx) = channel();
        world.execution_context(tx);

        world.detach();
        assert!(matches!(
            tasks.try_next().unwrap(),
            Some(WaitTaskSignal::Terminate(CdpError::FrameDetached))
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Some(Err(CdpError::FrameDetached))
        ));
        assert_eq!(world.wait_task_count(), 0);

        let (signals, mut tasks) = unbounded();
        world.add_wait_task(WaitTaskId(8), Vec::new(), signals);
        assert!(matches!(
            tasks.try_next().unwrap(),
            Some(WaitTaskSignal::Terminate(CdpError::FrameDetached))
        ));
    }
}
