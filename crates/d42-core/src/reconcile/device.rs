// Device reconciler
//
// Devices are addressed by name for writes and by id for reads and deletes.
// The name is the server-side match key, so renaming means replacement.

use tracing::{debug, info, warn};

use d42_api::Device42Client;

use super::{AttributeChange, DeleteOutcome, Plan, settle_delete, settle_read, settle_read_back};
use crate::config::ReconcilePolicy;
use crate::error::{CoreError, Operation};
use crate::model::custom_fields::build_bulk_payload;
use crate::model::{CustomFieldMapping, DesiredDevice, Lifecycle, ObservedDevice, ResourceState};
use crate::suppress;

pub type DeviceState = ResourceState<ObservedDevice>;

/// Drives one device through create, read, update and delete.
#[derive(Debug, Clone, Copy)]
pub struct DeviceReconciler<'a> {
    client: &'a Device42Client,
    policy: ReconcilePolicy,
}

impl<'a> DeviceReconciler<'a> {
    pub fn new(client: &'a Device42Client, policy: ReconcilePolicy) -> Self {
        Self { client, policy }
    }

    /// Create the device, write its custom fields in one bulk call, then
    /// bind the assigned id and read the device back.
    ///
    /// If the custom-field write fails the device already exists remotely;
    /// the state is left unbound and [`CoreError::PartialCreate`] names the
    /// orphaned id.
    ///
    /// A state that is already bound is refused with
    /// [`CoreError::AlreadyBound`] and left untouched.
    pub async fn create(&self, desired: &DesiredDevice, state: &mut DeviceState) -> Result<(), CoreError> {
        desired.validate()?;
        let resource = desired.identity();
        if let Some(id) = state.id() {
            return Err(CoreError::AlreadyBound { resource, id });
        }

        state.transition(Lifecycle::Creating);
        let id = match self
            .client
            .create_device(&desired.name, desired.device_type.as_ref())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                state.reset();
                return Err(CoreError::remote(Operation::Create, &resource, e));
            }
        };

        if !desired.custom_fields.is_empty() {
            let payload = build_bulk_payload(&desired.custom_fields);
            if let Err(source) = self
                .client
                .set_device_custom_fields(&desired.name, &payload)
                .await
            {
                warn!(resource = %resource, orphan_id = %id, error = %source, "custom fields not written after create");
                state.reset();
                return Err(CoreError::PartialCreate {
                    resource,
                    orphan_id: id,
                    source,
                });
            }
        }

        state.bind(id);
        info!(resource = %resource, %id, "device created");

        let read_back = self.client.get_device(id).await.map(ObservedDevice::from);
        settle_read_back(state, &resource, read_back);
        Ok(())
    }

    /// Refresh observed state. A device that no longer exists clears the
    /// binding without error.
    pub async fn read(&self, state: &mut DeviceState) -> Result<(), CoreError> {
        let Some(id) = state.id() else {
            return Ok(());
        };
        let resource = state
            .observed()
            .map_or_else(|| format!("device #{id}"), ObservedDevice::identity);

        let result = self.client.get_device(id).await.map(ObservedDevice::from);
        settle_read(self.policy, state, &resource, result)
    }

    /// Work out what an update would write, without touching the server.
    ///
    /// With nothing observed yet, every declared value counts as changed.
    pub fn plan(desired: &DesiredDevice, observed: Option<&ObservedDevice>) -> Result<Plan, CoreError> {
        let empty = CustomFieldMapping::new();
        let (observed_type, observed_fields) = match observed {
            Some(o) => {
                if !o.name.is_empty() && o.name != desired.name {
                    return Err(CoreError::RequiresReplacement {
                        resource: desired.identity(),
                        field: "name",
                    });
                }
                (o.device_type.as_deref(), &o.custom_fields)
            }
            None => (None, &empty),
        };

        let type_changed = observed_type.is_none_or(|t| !t.eq_ignore_ascii_case(desired.device_type.as_ref()));
        let attributes = if type_changed {
            vec![AttributeChange {
                field: "type",
                old: observed_type.map(str::to_owned),
                new: Some(desired.device_type.to_string()),
                sensitive: false,
            }]
        } else {
            Vec::new()
        };

        Ok(Plan {
            attributes,
            custom_fields: suppress::drift(&desired.custom_fields, observed_fields),
        })
    }

    /// Apply the plan for `desired` against the last-read state, then read
    /// back. Returns the plan that was applied; an empty plan makes no calls.
    pub async fn update(&self, desired: &DesiredDevice, state: &mut DeviceState) -> Result<Plan, CoreError> {
        let resource = desired.identity();
        let Some(id) = state.id() else {
            return Err(CoreError::NotBound { resource });
        };
        desired.validate()?;

        let plan = Self::plan(desired, state.observed())?;
        if plan.is_empty() {
            debug!(resource = %resource, "no changes");
            return Ok(plan);
        }

        state.transition(Lifecycle::Updating);
        let applied = self.apply(desired, &plan).await;
        state.transition(Lifecycle::Present);
        applied.map_err(|e| CoreError::remote(Operation::Update, &resource, e))?;

        let read_back = self.client.get_device(id).await.map(ObservedDevice::from);
        settle_read_back(state, &resource, read_back);
        Ok(plan)
    }

    async fn apply(&self, desired: &DesiredDevice, plan: &Plan) -> Result<(), d42_api::Error> {
        for change in &plan.attributes {
            debug!(device = %desired.name, %change, "planned change");
        }
        if !plan.attributes.is_empty() {
            self.client
                .upsert_device(&desired.name, desired.device_type.as_ref())
                .await?;
        }
        for change in &plan.custom_fields {
            debug!(device = %desired.name, key = %change.key, new = %change.new.render(), "custom field change");
            self.client
                .set_device_custom_field(&desired.name, &change.key, &change.new.render())
                .await?;
        }
        Ok(())
    }

    /// Delete the device. See [`ReconcilePolicy::surface_delete_failures`].
    pub async fn delete(&self, state: &mut DeviceState) -> Result<DeleteOutcome, CoreError> {
        let Some(id) = state.id() else {
            return Ok(DeleteOutcome::NotBound);
        };
        let resource = state
            .observed()
            .map_or_else(|| format!("device #{id}"), ObservedDevice::identity);

        let result = self.client.delete_device(id).await;
        settle_delete(self.policy, state, &resource, id, result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::DeviceType;
    use d42_api::{LooseValue, RemoteId};
    use pretty_assertions::assert_eq;

    fn observed(fields: &[(&str, &str)]) -> ObservedDevice {
        ObservedDevice {
            id: RemoteId::new(42),
            name: "db01".into(),
            device_type: Some("physical".into()),
            custom_fields: fields.iter().map(|(k, v)| (*k, *v)).collect(),
            in_service: Some(true),
            serial_no: None,
            last_updated: None,
        }
    }

    fn desired(fields: &[(&str, &str)]) -> DesiredDevice {
        let mut d = DesiredDevice::new("db01").with_type(DeviceType::Physical);
        for (k, v) in fields {
            d = d.with_custom_field(*k, *v);
        }
        d
    }

    #[test]
    fn plan_is_empty_when_in_sync() {
        let plan = DeviceReconciler::plan(&desired(&[("env", "prod")]), Some(&observed(&[("env", "prod")]))).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn plan_lists_only_declared_changes() {
        let plan = DeviceReconciler::plan(
            &desired(&[("env", "staging")]),
            Some(&observed(&[("env", "prod"), ("owner", "alice")])),
        )
        .unwrap();
        assert!(plan.attributes.is_empty());
        assert_eq!(plan.custom_fields.len(), 1);
        assert_eq!(plan.custom_fields[0].key, "env");
        assert_eq!(plan.custom_fields[0].new, LooseValue::text("staging"));
    }

    #[test]
    fn plan_detects_type_change() {
        let d = desired(&[]).with_type(DeviceType::Blade);
        let plan = DeviceReconciler::plan(&d, Some(&observed(&[]))).unwrap();
        assert_eq!(plan.attributes.len(), 1);
        assert_eq!(plan.attributes[0].to_string(), "type: physical -> blade");
    }

    #[test]
    fn plan_type_comparison_ignores_case() {
        let mut o = observed(&[]);
        o.device_type = Some("Physical".into());
        assert!(DeviceReconciler::plan(&desired(&[]), Some(&o)).unwrap().is_empty());
    }

    #[test]
    fn rename_requires_replacement() {
        let d = DesiredDevice::new("db02").with_type(DeviceType::Physical);
        let err = DeviceReconciler::plan(&d, Some(&observed(&[]))).unwrap_err();
        assert!(matches!(err, CoreError::RequiresReplacement { field: "name", .. }));
    }

    #[test]
    fn plan_without_observation_writes_everything() {
        let plan = DeviceReconciler::plan(&desired(&[("env", "prod")]), None).unwrap();
        assert_eq!(plan.write_count(), 2);
    }
}
