// Credential record reconciler
//
// Fixed-schema fields are rewritten together by id. Custom fields are keyed
// by username on the server, so a username change means replacement.

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use d42_api::{Device42Client, PasswordRecord};

use super::{AttributeChange, DeleteOutcome, Plan, settle_delete, settle_read, settle_read_back};
use crate::config::ReconcilePolicy;
use crate::error::{CoreError, Operation};
use crate::model::custom_fields::build_bulk_payload;
use crate::model::{CustomFieldMapping, DesiredPassword, Lifecycle, ObservedPassword, ResourceState};
use crate::suppress;

pub type PasswordState = ResourceState<ObservedPassword>;

/// Drives one credential record through create, read, update and delete.
#[derive(Debug, Clone, Copy)]
pub struct PasswordReconciler<'a> {
    client: &'a Device42Client,
    policy: ReconcilePolicy,
}

impl<'a> PasswordReconciler<'a> {
    pub fn new(client: &'a Device42Client, policy: ReconcilePolicy) -> Self {
        Self { client, policy }
    }

    /// Create the record and its custom fields, then bind and read back.
    ///
    /// Same atomicity rule as devices: a failed custom-field write leaves the
    /// state unbound and reports the orphaned id.
    ///
    /// A state that is already bound is refused with
    /// [`CoreError::AlreadyBound`] and left untouched.
    pub async fn create(&self, desired: &DesiredPassword, state: &mut PasswordState) -> Result<(), CoreError> {
        desired.validate()?;
        let resource = desired.identity();
        if let Some(id) = state.id() {
            return Err(CoreError::AlreadyBound { resource, id });
        }

        state.transition(Lifecycle::Creating);
        let id = match self.client.create_password(&desired.fields()).await {
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
                .set_password_custom_fields(&desired.username, &payload)
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
        info!(resource = %resource, %id, "password created");

        let read_back = self
            .client
            .get_password(id, desired.plain_text)
            .await
            .map(|r| observe(r, desired.plain_text));
        settle_read_back(state, &resource, read_back);
        Ok(())
    }

    /// Refresh observed state. `plain_text` asks the server for the secret;
    /// without it the observed password stays unset.
    pub async fn read(&self, state: &mut PasswordState, plain_text: bool) -> Result<(), CoreError> {
        let Some(id) = state.id() else {
            return Ok(());
        };
        let resource = state
            .observed()
            .map_or_else(|| format!("password #{id}"), ObservedPassword::identity);

        let result = self
            .client
            .get_password(id, plain_text)
            .await
            .map(|r| observe(r, plain_text));
        settle_read(self.policy, state, &resource, result)
    }

    /// Work out what an update would write, without touching the server.
    pub fn plan(desired: &DesiredPassword, observed: Option<&ObservedPassword>) -> Result<Plan, CoreError> {
        let Some(o) = observed else {
            return Ok(unobserved_plan(desired));
        };
        if !o.username.is_empty() && o.username != desired.username {
            return Err(CoreError::RequiresReplacement {
                resource: desired.identity(),
                field: "username",
            });
        }

        let mut attributes: Vec<AttributeChange> = [
            ("label", o.label.as_deref(), desired.label.as_deref()),
            ("category", o.category.as_deref(), desired.category.as_deref()),
            ("notes", o.notes.as_deref(), desired.notes.as_deref()),
            ("device", o.device.as_deref(), desired.device.as_deref()),
            ("appcomp", o.appcomp.as_deref(), desired.appcomp.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, old, new)| AttributeChange::between(field, old, new))
        .collect();

        let secret_changed = desired.plain_text
            && o.password
                .as_ref()
                .is_some_and(|p| p.expose_secret() != desired.password.expose_secret());
        if secret_changed {
            attributes.push(AttributeChange::secret("password"));
        }

        Ok(Plan {
            attributes,
            custom_fields: suppress::drift(&desired.custom_fields, &o.custom_fields),
        })
    }

    /// Apply the plan for `desired`, then read back.
    pub async fn update(&self, desired: &DesiredPassword, state: &mut PasswordState) -> Result<Plan, CoreError> {
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
        let applied = self.apply(id, desired, &plan).await;
        state.transition(Lifecycle::Present);
        applied.map_err(|e| CoreError::remote(Operation::Update, &resource, e))?;

        let read_back = self
            .client
            .get_password(id, desired.plain_text)
            .await
            .map(|r| observe(r, desired.plain_text));
        settle_read_back(state, &resource, read_back);
        Ok(plan)
    }

    async fn apply(
        &self,
        id: d42_api::RemoteId,
        desired: &DesiredPassword,
        plan: &Plan,
    ) -> Result<(), d42_api::Error> {
        if !plan.attributes.is_empty() {
            for change in &plan.attributes {
                debug!(username = %desired.username, %change, "planned change");
            }
            self.client.update_password(id, &desired.fields()).await?;
        }
        for change in &plan.custom_fields {
            debug!(username = %desired.username, key = %change.key, new = %change.new.render(), "custom field change");
            self.client
                .set_password_custom_field(&desired.username, &change.key, &change.new.render())
                .await?;
        }
        Ok(())
    }

    /// Delete the record. See [`ReconcilePolicy::surface_delete_failures`].
    pub async fn delete(&self, state: &mut PasswordState) -> Result<DeleteOutcome, CoreError> {
        let Some(id) = state.id() else {
            return Ok(DeleteOutcome::NotBound);
        };
        let resource = state
            .observed()
            .map_or_else(|| format!("password #{id}"), ObservedPassword::identity);

        let result = self.client.delete_password(id).await;
        settle_delete(self.policy, state, &resource, id, result)
    }
}

fn observe(record: PasswordRecord, plain_text: bool) -> ObservedPassword {
    let mut observed = ObservedPassword::from(record);
    if !plain_text {
        observed.password = None;
    }
    observed
}

/// Nothing read yet: every declared value is written.
fn unobserved_plan(desired: &DesiredPassword) -> Plan {
    let mut attributes: Vec<AttributeChange> = [
        ("label", desired.label.as_deref()),
        ("category", desired.category.as_deref()),
        ("notes", desired.notes.as_deref()),
        ("device", desired.device.as_deref()),
        ("appcomp", desired.appcomp.as_deref()),
    ]
    .into_iter()
    .filter_map(|(field, new)| AttributeChange::between(field, None, new))
    .collect();
    attributes.push(AttributeChange::secret("password"));

    Plan {
        attributes,
        custom_fields: suppress::drift(&desired.custom_fields, &CustomFieldMapping::new()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use d42_api::RemoteId;
    use secrecy::SecretString;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    fn observed() -> ObservedPassword {
        ObservedPassword {
            id: RemoteId::new(7),
            username: "root".into(),
            password: Some(secret("s3cret")),
            label: Some("db01".into()),
            category: None,
            notes: None,
            device: None,
            appcomp: None,
            custom_fields: [("env", "prod")].into_iter().collect(),
            last_pw_change: None,
            first_added: None,
        }
    }

    fn desired() -> DesiredPassword {
        DesiredPassword::new("root", secret("s3cret"))
            .with_label("db01")
            .with_custom_field("env", "prod")
    }

    #[test]
    fn in_sync_record_plans_nothing() {
        assert!(PasswordReconciler::plan(&desired(), Some(&observed())).unwrap().is_empty());
    }

    #[test]
    fn secret_change_is_planned_but_hidden() {
        let mut d = desired();
        d.password = secret("rotated");
        let plan = PasswordReconciler::plan(&d, Some(&observed())).unwrap();
        assert_eq!(plan.attributes.len(), 1);
        assert!(plan.attributes[0].sensitive);
        assert!(!format!("{plan:?}").contains("rotated"));
    }

    #[test]
    fn secret_is_ignored_without_plain_text() {
        let mut d = desired();
        d.password = secret("rotated");
        d.plain_text = false;
        assert!(PasswordReconciler::plan(&d, Some(&observed())).unwrap().is_empty());
    }

    #[test]
    fn field_changes_collapse_into_one_write() {
        let mut d = desired();
        d.notes = Some("primary".into());
        d.category = Some("prod".into());
        let plan = PasswordReconciler::plan(&d, Some(&observed())).unwrap();
        assert_eq!(plan.attributes.len(), 2);
        assert_eq!(plan.write_count(), 1);
    }

    #[test]
    fn username_change_requires_replacement() {
        let d = DesiredPassword::new("admin", secret("s3cret"));
        let err = PasswordReconciler::plan(&d, Some(&observed())).unwrap_err();
        assert!(matches!(err, CoreError::RequiresReplacement { field: "username", .. }));
    }

    #[test]
    fn unobserved_plan_writes_declared_values() {
        let plan = PasswordReconciler::plan(&desired(), None).unwrap();
        let fields: Vec<&str> = plan.attributes.iter().map(|a| a.field).collect();
        assert_eq!(fields, ["label", "password"]);
        assert_eq!(plan.custom_fields.len(), 1);
    }
}
