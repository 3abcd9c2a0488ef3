// Domain model: desired and observed resource shapes plus lifecycle state.

pub mod custom_fields;
pub mod device;
pub mod password;
pub mod state;

pub use custom_fields::{CustomFieldChange, CustomFieldMapping};
pub use device::{DesiredDevice, DeviceType, ObservedDevice};
pub use password::{DesiredPassword, ObservedPassword};
pub use state::{Lifecycle, ResourceState};
