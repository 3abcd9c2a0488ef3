// d42-core: Reconciliation engine for Device42 devices and credential records
//
// Sits between an orchestration layer (which owns desired state and the
// persisted identifier) and the d42-api client (which owns the wire).

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod suppress;

pub use config::{BasicCredentials, ProviderConfig, ReconcilePolicy, TlsVerification};
pub use error::{CoreError, Operation};
pub use model::custom_fields::{build_bulk_payload, flatten, parse_bulk_payload};
pub use model::{
    CustomFieldChange, CustomFieldMapping, DesiredDevice, DesiredPassword, DeviceType, Lifecycle,
    ObservedDevice, ObservedPassword, ResourceState,
};
pub use reconcile::device::DeviceState;
pub use reconcile::password::PasswordState;
pub use reconcile::{AttributeChange, DeleteOutcome, DeviceReconciler, PasswordReconciler, Plan};
pub use suppress::{CUSTOM_FIELDS_PREFIX, is_drift};

// Re-exported so downstream crates need not depend on d42-api directly.
pub use d42_api::{Device42Client, LooseValue, RemoteId};
