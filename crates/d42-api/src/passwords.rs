// Password (credential record) endpoints
//
// Create and update share `POST 1.0/passwords/`; an `id` field turns the
// post into an update. Lookups go through a query-string filter rather than
// an id path segment and answer with a `{passwords: [...]}` list.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::Device42Client;
use crate::error::Error;
use crate::models::{PasswordList, PasswordRecord, RemoteId};

pub const PASSWORDS_PATH: &str = "1.0/passwords/";
pub const PASSWORD_CUSTOM_FIELD_PATH: &str = "1.0/custom_fields/password";

/// Fixed-schema fields of a credential record, borrowed for one write.
#[derive(Debug, Clone, Copy)]
pub struct PasswordFields<'a> {
    pub username: &'a str,
    pub password: &'a SecretString,
    pub label: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub category: Option<&'a str>,
    pub device: Option<&'a str>,
    pub appcomp: Option<&'a str>,
}

impl<'a> PasswordFields<'a> {
    /// Form used on create: the four core fields always, the rest only when set.
    fn create_form(&self) -> Vec<(&'static str, &'a str)> {
        let mut form = vec![
            ("username", self.username),
            ("password", self.password.expose_secret()),
            ("label", self.label.unwrap_or_default()),
            ("notes", self.notes.unwrap_or_default()),
        ];
        for (name, value) in self.optional() {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                form.push((name, v));
            }
        }
        form
    }

    /// Form used on update: every field, unset ones as empty strings so they clear.
    fn update_form(&self) -> Vec<(&'static str, &'a str)> {
        let mut form = vec![
            ("username", self.username),
            ("password", self.password.expose_secret()),
            ("label", self.label.unwrap_or_default()),
            ("notes", self.notes.unwrap_or_default()),
        ];
        for (name, value) in self.optional() {
            form.push((name, value.unwrap_or_default()));
        }
        form
    }

    fn optional(&self) -> [(&'static str, Option<&'a str>); 3] {
        [
            ("category", self.category),
            ("device", self.device),
            ("appcomp", self.appcomp),
        ]
    }
}

impl Device42Client {
    /// Create a credential record and return its assigned id.
    ///
    /// `POST 1.0/passwords/`
    pub async fn create_password(&self, fields: &PasswordFields<'_>) -> Result<RemoteId, Error> {
        debug!(username = fields.username, label = ?fields.label, "creating password");
        self.create(PASSWORDS_PATH, &fields.create_form()).await
    }

    /// Rewrite the fixed-schema fields of an existing credential record.
    ///
    /// `POST 1.0/passwords/` with `id` plus every field
    pub async fn update_password(
        &self,
        id: RemoteId,
        fields: &PasswordFields<'_>,
    ) -> Result<(), Error> {
        debug!(%id, username = fields.username, "updating password");
        let id = id.to_string();
        let mut form = vec![("id", id.as_str())];
        form.extend(fields.update_form());
        self.upsert(PASSWORDS_PATH, &form).await?;
        Ok(())
    }

    /// Look up a credential record by id.
    ///
    /// `GET 1.0/passwords/?plain_text={yes|no}&id={id}`. An empty result
    /// list is reported as [`Error::NotFound`].
    pub async fn get_password(&self, id: RemoteId, plain_text: bool) -> Result<PasswordRecord, Error> {
        let id_param = id.to_string();
        let plain_text = if plain_text { "yes" } else { "no" };
        let list: PasswordList = self
            .read(
                PASSWORDS_PATH,
                &[("plain_text", plain_text), ("id", id_param.as_str())],
            )
            .await?;

        list.passwords
            .into_iter()
            .find(|p| p.id == id.get())
            .ok_or_else(|| Error::NotFound {
                path: format!("{PASSWORDS_PATH}?id={id}"),
            })
    }

    /// Write all custom fields of a credential record in one call.
    ///
    /// `PUT 1.0/custom_fields/password` with `username`, `bulk_fields`
    pub async fn set_password_custom_fields(
        &self,
        username: &str,
        bulk_fields: &str,
    ) -> Result<(), Error> {
        debug!(username, "writing password custom fields (bulk)");
        self.update(
            PASSWORD_CUSTOM_FIELD_PATH,
            &[("username", username), ("bulk_fields", bulk_fields)],
        )
        .await?;
        Ok(())
    }

    /// Write a single custom field of a credential record.
    ///
    /// `PUT 1.0/custom_fields/password` with `username`, `key`, `value`
    pub async fn set_password_custom_field(
        &self,
        username: &str,
        key: &str,
        value: &str,
    ) -> Result<(), Error> {
        debug!(username, key, "writing password custom field");
        self.update(
            PASSWORD_CUSTOM_FIELD_PATH,
            &[("username", username), ("key", key), ("value", value)],
        )
        .await?;
        Ok(())
    }

    /// Delete a credential record.
    ///
    /// `DELETE 1.0/passwords/{id}/`
    pub async fn delete_password(&self, id: RemoteId) -> Result<(), Error> {
        debug!(%id, "deleting password");
        self.delete(&format!("{PASSWORDS_PATH}{id}/")).await?;
        Ok(())
    }
}
