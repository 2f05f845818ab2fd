//! # Ripple Shared
//! Reactive object-graph replication: entities bound into a [`Protocol`] are kept in step with
//! their counterparts on the other side of a [`Wire`].

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use ripple_serde::{ByteReader, ByteWriter, ConstByteLength, Serde, SerdeErr};

mod error;
mod identity;
mod lifetime;
mod protocol;
mod reactive;
mod scheduler;
mod serialization;
mod wire;
mod world;

cfg_if! {
    if #[cfg(feature = "transport_tcp")] {
        mod transport;

        pub use transport::{
            error::TransportError, socket_config::SocketConfig, socket_wire::SocketWire,
        };
    }
}

pub use error::RdError;
pub use identity::{
    identities::{IdKind, Identities},
    rd_id::RdId,
};
pub use lifetime::{
    lifetime::{Action, Lifetime, LifetimeDefinition, LifetimeStatus},
    sequential_lifetimes::SequentialLifetimes,
};
pub use protocol::{
    registry::EntityKey, ExtCreated, Protocol, ProtocolBuilder, ProtocolError,
};
pub use reactive::{
    list::{ListEvent, ViewableList},
    map::{MapEvent, ViewableMap},
    property::Property,
    set::{SetEvent, ViewableSet},
    signal::Signal,
};
pub use scheduler::{
    queue_scheduler::QueueScheduler, synchronous_scheduler::SynchronousScheduler,
    thread_scheduler::ThreadScheduler, Scheduler,
};
pub use serialization::{
    error::SerializationError,
    intern_root::{InternRoot, InternedValue},
    polymorphic::{PolyBox, PolyValue, Polymorphic},
    serialization_ctx::SerializationCtx,
    serializers::{Marshaller, ReadFn, Serializers, WriteFn},
    value_serializer::{
        entity_serializer, static_serializer, EntitySerializer, InternedSerializer,
        PolymorphicSerializer, StaticSerializer, ValueSerializer,
    },
};
pub use wire::{
    error::WireError, message_broker::MessageBroker, wire_base::WireBase, Wire, WireHandler,
};
pub use world::{
    component::{
        change_guard::{LocalChange, LocalChangeScope},
        error::ComponentError,
        rd_list::RdList,
        rd_map::RdMap,
        rd_property::RdProperty,
        rd_set::RdSet,
        rd_signal::RdSignal,
        reactive_base::ReactiveBase,
    },
    entity::{
        bind_state::BindState,
        bindable::{downcast, BindParent, Bindable},
        bindable_core::BindableCore,
        binding_scope::BindingScope,
        error::BindError,
        lifecycle::{attach_child, child_parent_of},
        location::Location,
        model::RdModel,
        rd_value::RdValue,
    },
    ext::{
        ext_state::ExtState,
        ext_wire::ExtWire,
        rd_ext::{ExtThreading, RdExt},
    },
    sync::{
        entity_view::{EntityKind, EntityView, Synchronizable},
        error::SyncError,
        model_synchronizer::{ModelSynchronizer, SyncGuard},
    },
    task::{
        error::RpcError,
        rd_call::RdCall,
        rd_endpoint::{RdEndpoint, TaskHandler},
        rd_task::RdTask,
        rpc_timeouts::RpcTimeouts,
        task_result::{RdFault, RdTaskResult},
    },
};
