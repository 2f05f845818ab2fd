//! # Message Broker
//!
//! Routes inbound `(id, payload)` pairs to the subscription bound for `id`.
//!
//! Entities on the two ends of a connection bind independently, so messages for an id may
//! arrive before anything is subscribed to it. The broker never blocks the receive thread
//! waiting for a bind and never reorders messages of one id:
//!
//! | situation on arrival                                          | action                                  |
//! |---------------------------------------------------------------|-----------------------------------------|
//! | subscribed on the default scheduler, or an out-of-order one   | deliver through the subscription        |
//! | subscribed on another scheduler, default deliveries pending   | buffer behind the pending deliveries    |
//! | subscribed on another scheduler, nothing pending              | deliver through the subscription        |
//! | not subscribed                                                | count as pending, defer to default      |
//!
//! A deferred delivery runs on the default scheduler, looks the subscription up again and
//! delivers or drops the message. The pending record of an id lives until its count is zero
//! **and** its buffer has been drained; while it exists every new message for a custom
//! scheduler subscription is appended to the buffer, so nothing can overtake a buffered
//! message.

use std::{
    collections::{HashMap, VecDeque},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};

use log::{error, trace};
use parking_lot::Mutex;

use crate::{
    identity::rd_id::RdId,
    lifetime::lifetime::Lifetime,
    scheduler::Scheduler,
    wire::{error::WireError, WireHandler},
};

struct Subscription {
    id: RdId,
    scheduler: Arc<dyn Scheduler>,
    handler: WireHandler,
    lifetime: Lifetime,
    in_flight: AtomicUsize,
}

impl Subscription {
    fn run(&self, payload: &[u8]) {
        if catch_unwind(AssertUnwindSafe(|| (self.handler)(payload))).is_err() {
            error!("Handler for id {} panicked; message dropped", self.id);
        }
    }
}

#[derive(Default)]
struct PendingMessages {
    default_scheduler_messages: usize,
    custom_scheduler_messages: VecDeque<Vec<u8>>,
}

#[derive(Default)]
struct BrokerState {
    subscriptions: HashMap<RdId, Arc<Subscription>>,
    pending: HashMap<RdId, PendingMessages>,
}

pub struct MessageBroker {
    default_scheduler: Arc<dyn Scheduler>,
    state: Arc<Mutex<BrokerState>>,
}

impl MessageBroker {
    pub fn new(default_scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            default_scheduler,
            state: Arc::new(Mutex::new(BrokerState::default())),
        }
    }

    pub fn default_scheduler(&self) -> Arc<dyn Scheduler> {
        self.default_scheduler.clone()
    }

    pub fn dispatch(&self, id: RdId, payload: Vec<u8>) -> Result<(), WireError> {
        if id.is_null() {
            return Err(WireError::NullId {
                operation: "dispatch",
            });
        }
        trace!("Dispatching {} bytes for id {}", payload.len(), id);

        let mut state = self.state.lock();
        match state.subscriptions.get(&id).cloned() {
            Some(subscription) => {
                let direct = same_scheduler(&subscription.scheduler, &self.default_scheduler)
                    || subscription.scheduler.out_of_order_execution();
                if !direct {
                    if let Some(pending) = state.pending.get_mut(&id) {
                        pending.custom_scheduler_messages.push_back(payload);
                        return Ok(());
                    }
                }
                drop(state);
                invoke(&self.state, subscription, payload);
            }
            None => {
                state
                    .pending
                    .entry(id)
                    .or_default()
                    .default_scheduler_messages += 1;
                drop(state);

                let weak_state = Arc::downgrade(&self.state);
                let default_scheduler = self.default_scheduler.clone();
                self.default_scheduler.queue(Box::new(move || {
                    deliver_deferred(weak_state, default_scheduler, id, payload);
                }));
            }
        }
        Ok(())
    }

    /// Subscribes `handler` for `id` until `lifetime` terminates
    pub fn advise_on(
        &self,
        lifetime: &Lifetime,
        id: RdId,
        scheduler: Arc<dyn Scheduler>,
        handler: WireHandler,
    ) -> Result<(), WireError> {
        if id.is_null() {
            return Err(WireError::NullId {
                operation: "subscribe",
            });
        }

        let subscription = Arc::new(Subscription {
            id,
            scheduler,
            handler,
            lifetime: lifetime.clone(),
            in_flight: AtomicUsize::new(0),
        });
        let registered = subscription.clone();
        let weak_state = Arc::downgrade(&self.state);

        let outcome = lifetime.bracket(
            || {
                let mut state = self.state.lock();
                if state.subscriptions.contains_key(&id) {
                    return Err(WireError::DuplicateSubscription { id });
                }
                state.subscriptions.insert(id, subscription);
                trace!("Subscribed id {}", id);
                Ok(())
            },
            move || {
                if let Some(state) = weak_state.upgrade() {
                    let mut state = state.lock();
                    let current = state
                        .subscriptions
                        .get(&id)
                        .map_or(false, |current| Arc::ptr_eq(current, &registered));
                    if current {
                        state.subscriptions.remove(&id);
                        trace!("Unsubscribed id {}", id);
                    }
                }
            },
        );
        outcome.unwrap_or(Ok(()))
    }

    pub fn is_subscribed(&self, id: RdId) -> bool {
        self.state.lock().subscriptions.contains_key(&id)
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Whether messages for `id` are still waiting on the default scheduler or in the buffer
    pub fn has_pending(&self, id: RdId) -> bool {
        self.state.lock().pending.contains_key(&id)
    }

    /// Deliveries queued on the subscription's scheduler that have not run yet
    pub fn in_flight(&self, id: RdId) -> usize {
        self.state
            .lock()
            .subscriptions
            .get(&id)
            .map_or(0, |subscription| subscription.in_flight.load(Ordering::Acquire))
    }
}

fn same_scheduler(a: &Arc<dyn Scheduler>, b: &Arc<dyn Scheduler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

fn invoke(state: &Arc<Mutex<BrokerState>>, subscription: Arc<Subscription>, payload: Vec<u8>) {
    let weak_state: Weak<Mutex<BrokerState>> = Arc::downgrade(state);
    let scheduler = subscription.scheduler.clone();
    subscription.in_flight.fetch_add(1, Ordering::AcqRel);
    scheduler.queue(Box::new(move || {
        let still_subscribed = weak_state.upgrade().map_or(false, |state| {
            state
                .lock()
                .subscriptions
                .get(&subscription.id)
                .map_or(false, |current| Arc::ptr_eq(current, &subscription))
        });
        if still_subscribed && subscription.lifetime.is_alive() {
            subscription.run(&payload);
        } else {
            trace!(
                "Subscription for id {} ended before delivery; message dropped",
                subscription.id
            );
        }
        subscription.in_flight.fetch_sub(1, Ordering::AcqRel);
    }));
}

fn deliver_deferred(
    weak_state: Weak<Mutex<BrokerState>>,
    default_scheduler: Arc<dyn Scheduler>,
    id: RdId,
    payload: Vec<u8>,
) {
    let state = match weak_state.upgrade() {
        Some(state) => state,
        None => return,
    };

    let subscription = state.lock().subscriptions.get(&id).cloned();
    match subscription {
        Some(subscription) => {
            if same_scheduler(&subscription.scheduler, &default_scheduler) {
                if subscription.lifetime.is_alive() {
                    subscription.run(&payload);
                }
            } else {
                invoke(&state, subscription, payload);
            }
        }
        None => trace!("No handler for id {}; message dropped", id),
    }

    let drained = {
        let mut guard = state.lock();
        match guard.pending.get_mut(&id) {
            Some(pending) => {
                pending.default_scheduler_messages =
                    pending.default_scheduler_messages.saturating_sub(1);
                pending.default_scheduler_messages == 0
            }
            None => false,
        }
    };
    if drained {
        flush_buffered(&state, id);
    }
}

// Hands buffered payloads to the subscription in arrival order. The pending record is only
// removed under the lock once the buffer is empty, so a payload arriving meanwhile is buffered
// and picked up by the next round instead of overtaking the ones being flushed.
fn flush_buffered(state: &Arc<Mutex<BrokerState>>, id: RdId) {
    loop {
        let (batch, subscription) = {
            let mut guard = state.lock();
            let pending = match guard.pending.get_mut(&id) {
                Some(pending) => pending,
                None => return,
            };
            if pending.default_scheduler_messages > 0 {
                return;
            }
            if pending.custom_scheduler_messages.is_empty() {
                guard.pending.remove(&id);
                return;
            }
            let batch = std::mem::take(&mut pending.custom_scheduler_messages);
            let subscription = guard.subscriptions.get(&id).cloned();
            (batch, subscription)
        };

        for payload in batch {
            match &subscription {
                Some(subscription) => invoke(state, subscription.clone(), payload),
                None => trace!("No handler for id {}; buffered message dropped", id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lifetime::lifetime::LifetimeDefinition,
        scheduler::{queue_scheduler::QueueScheduler, synchronous_scheduler::SynchronousScheduler},
    };

    fn recording_handler(log: &Arc<Mutex<Vec<Vec<u8>>>>) -> WireHandler {
        let log = log.clone();
        Arc::new(move |payload: &[u8]| log.lock().push(payload.to_vec()))
    }

    #[test]
    fn null_id_is_rejected() {
        let broker = MessageBroker::new(Arc::new(SynchronousScheduler));
        assert_eq!(
            broker.dispatch(RdId::NULL, vec![1]),
            Err(WireError::NullId {
                operation: "dispatch"
            })
        );
    }

    #[test]
    fn late_subscriber_sees_messages_in_arrival_order() {
        let scheduler = Arc::new(QueueScheduler::new("default"));
        let broker = MessageBroker::new(scheduler.clone());
        let id = RdId::new(7);

        broker.dispatch(id, vec![1]).unwrap();
        broker.dispatch(id, vec![2]).unwrap();
        assert!(broker.has_pending(id));

        let definition = LifetimeDefinition::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        broker
            .advise_on(&definition, id, scheduler.clone(), recording_handler(&log))
            .unwrap();
        broker.dispatch(id, vec![3]).unwrap();
        scheduler.pump();

        assert_eq!(*log.lock(), vec![vec![1], vec![2], vec![3]]);
        assert!(!broker.has_pending(id));
    }

    #[test]
    fn custom_scheduler_messages_wait_behind_pending_defaults() {
        let default_scheduler = Arc::new(QueueScheduler::new("default"));
        let custom_scheduler = Arc::new(QueueScheduler::new("custom"));
        let broker = MessageBroker::new(default_scheduler.clone());
        let id = RdId::new(11);

        broker.dispatch(id, vec![1]).unwrap();

        let definition = LifetimeDefinition::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        broker
            .advise_on(&definition, id, custom_scheduler.clone(), recording_handler(&log))
            .unwrap();
        broker.dispatch(id, vec![2]).unwrap();
        broker.dispatch(id, vec![3]).unwrap();

        // nothing reaches the custom scheduler before the deferred delivery ran
        assert_eq!(custom_scheduler.pending(), 0);
        default_scheduler.pump();
        assert!(!broker.has_pending(id));
        custom_scheduler.pump();

        broker.dispatch(id, vec![4]).unwrap();
        custom_scheduler.pump();
        assert_eq!(*log.lock(), vec![vec![1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn message_without_subscriber_is_dropped() {
        let scheduler = Arc::new(QueueScheduler::new("default"));
        let broker = MessageBroker::new(scheduler.clone());
        let id = RdId::new(3);

        broker.dispatch(id, vec![1]).unwrap();
        scheduler.pump();
        assert!(!broker.has_pending(id));

        let definition = LifetimeDefinition::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        broker
            .advise_on(&definition, id, scheduler.clone(), recording_handler(&log))
            .unwrap();
        scheduler.pump();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn termination_unsubscribes_and_drops_queued_deliveries() {
        let scheduler = Arc::new(QueueScheduler::new("default"));
        let broker = MessageBroker::new(scheduler.clone());
        let id = RdId::new(5);
        let definition = LifetimeDefinition::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        broker
            .advise_on(&definition, id, scheduler.clone(), recording_handler(&log))
            .unwrap();
        broker.dispatch(id, vec![1]).unwrap();
        assert_eq!(broker.in_flight(id), 1);
        definition.terminate();
        scheduler.pump();

        assert!(!broker.is_subscribed(id));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn duplicate_subscription_is_rejected() {
        let broker = MessageBroker::new(Arc::new(SynchronousScheduler));
        let id = RdId::new(9);
        let definition = LifetimeDefinition::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        broker
            .advise_on(&definition, id, Arc::new(SynchronousScheduler), recording_handler(&log))
            .unwrap();
        let second = broker.advise_on(
            &definition,
            id,
            Arc::new(SynchronousScheduler),
            recording_handler(&log),
        );
        assert_eq!(second, Err(WireError::DuplicateSubscription { id }));

        definition.terminate();
        assert_eq!(broker.subscription_count(), 0);
    }

    #[test]
    fn panicking_handler_does_not_poison_the_broker() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(SynchronousScheduler);
        let broker = MessageBroker::new(scheduler.clone());
        let id = RdId::new(13);
        let definition = LifetimeDefinition::new();

        broker
            .advise_on(&definition, id, scheduler, Arc::new(|_: &[u8]| panic!("boom")))
            .unwrap();
        broker.dispatch(id, vec![1]).unwrap();
        broker.dispatch(id, vec![2]).unwrap();
        assert!(broker.is_subscribed(id));
    }
}
