//! Organisation and user records
//!
//! Records are flat maps from field name to text, each field backed by one
//! directory attribute. Unset fields read as `""` so that updates can be
//! diffed field by field.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument};

use ldapadmin_directory::{DirectoryClient, DirectoryError, Entry, Filter, Modification, SearchRequest};

use crate::agent::RoleAgent;
use crate::error::{AgentError, AgentResult};

/// Field name to attribute, for user entries. Sorted by field name.
pub const USER_FIELDS: &[(&str, &str)] = &[
    ("address", "postalAddress"),
    ("email", "mail"),
    ("fax", "facsimileTelephoneNumber"),
    ("name", "cn"),
    ("organisation", "o"),
    ("phone", "telephoneNumber"),
    ("url", "labeledURI"),
];

/// Field name to attribute, for organisation entries. Sorted by field name.
pub const ORG_FIELDS: &[(&str, &str)] = &[
    ("address", "postalAddress"),
    ("country", "st"),
    ("fax", "facsimileTelephoneNumber"),
    ("locality", "l"),
    ("name", "o"),
    ("phone", "telephoneNumber"),
    ("po_box", "postOfficeBox"),
    ("postal_code", "postalCode"),
    ("street", "street"),
    ("url", "labeledURI"),
];

static ORG_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_]+$").expect("ORG_ID_REGEX is a valid regex pattern"));

/// Field values keyed by field name.
pub type FieldMap = BTreeMap<String, String>;

/// An organisation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganisationRecord {
    pub id: String,
    pub dn: String,
    /// Every field of [`ORG_FIELDS`], unset ones as `""`.
    #[serde(flatten)]
    pub fields: FieldMap,
}

/// A user entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub dn: String,
    /// Every field of [`USER_FIELDS`], unset ones as `""`.
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl OrganisationRecord {
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }
}

impl UserRecord {
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }
}

fn unpack(map: &[(&str, &str)], entry: &Entry) -> FieldMap {
    map.iter()
        .map(|(field, attr)| {
            let value = entry.first(attr).unwrap_or_default().to_string();
            (field.to_string(), value)
        })
        .collect()
}

/// Check field names against `map` and fill in every missing field as `""`.
pub fn complete_fields(map: &[(&str, &str)], input: &FieldMap) -> AgentResult<FieldMap> {
    if let Some(unknown) = input
        .keys()
        .find(|name| !map.iter().any(|(field, _)| *field == name.as_str()))
    {
        return Err(AgentError::UnknownField {
            field: unknown.clone(),
        });
    }
    Ok(map
        .iter()
        .map(|(field, _)| {
            let value = input.get(*field).cloned().unwrap_or_default();
            (field.to_string(), value)
        })
        .collect())
}

/// Per-attribute changes turning `old` into `new`.
///
/// Both maps must be complete (see [`complete_fields`]). A field going from
/// empty to set is an add, from set to empty a delete of the old value,
/// and from one value to another a replace.
pub fn org_info_diff(old: &FieldMap, new: &FieldMap) -> Vec<Modification> {
    let mut changes = Vec::new();
    for (field, attr) in ORG_FIELDS {
        let old_value = old.get(*field).map_or("", String::as_str);
        let new_value = new.get(*field).map_or("", String::as_str);

        match (old_value.is_empty(), new_value.is_empty()) {
            (true, true) => {}
            (true, false) => changes.push(Modification::add(*attr, new_value)),
            (false, true) => changes.push(Modification::delete(*attr, old_value)),
            (false, false) if old_value != new_value => {
                changes.push(Modification::replace(*attr, new_value));
            }
            (false, false) => {}
        }
    }
    changes
}

impl<C: DirectoryClient> RoleAgent<C> {
    /// Create an organisation. Empty fields are not written.
    #[instrument(skip(self, fields))]
    pub fn create_org(&mut self, id: &str, fields: &FieldMap) -> AgentResult<()> {
        self.require_bound("create_org")?;
        if !ORG_ID_REGEX.is_match(id) {
            return Err(AgentError::invalid_id(
                id,
                "organisation ids may only contain lowercase letters and '_'",
            ));
        }
        let fields = complete_fields(ORG_FIELDS, fields)?;
        let dn = self.codec.org_dn(id)?;

        let mut attrs = vec![("objectClass".to_string(), self.org_object_classes.clone())];
        for (field, attr) in ORG_FIELDS {
            let value = &fields[*field];
            if !value.is_empty() {
                attrs.push((attr.to_string(), vec![value.clone()]));
            }
        }

        self.client
            .add(&dn, &attrs)
            .map_err(|err| AgentError::unexpected("create_org", &dn, err))?;
        info!(dn = %dn, "Organisation created");
        Ok(())
    }

    /// Bring an organisation's fields to `fields`; absent fields are
    /// cleared. One batched modify, or none when nothing changed.
    ///
    /// Returns the modifications applied.
    #[instrument(skip(self, fields))]
    pub fn set_org_info(&mut self, id: &str, fields: &FieldMap) -> AgentResult<Vec<Modification>> {
        self.require_bound("set_org_info")?;
        let new = complete_fields(ORG_FIELDS, fields)?;
        let old = self.org_info(id)?;

        let changes = org_info_diff(&old.fields, &new);
        if changes.is_empty() {
            debug!("Organisation unchanged");
            return Ok(changes);
        }

        self.client
            .modify(&old.dn, &changes)
            .map_err(|err| AgentError::unexpected("set_org_info", &old.dn, err))?;
        info!(dn = %old.dn, count = changes.len(), "Organisation updated");
        Ok(changes)
    }

    #[instrument(skip(self))]
    pub fn delete_org(&mut self, id: &str) -> AgentResult<()> {
        self.require_bound("delete_org")?;
        let dn = self.codec.org_dn(id)?;
        self.client
            .delete(&dn)
            .map_err(|err| match err {
                DirectoryError::NoSuchObject { .. } => {
                    AgentError::NotFound { dn: dn.clone() }
                }
                err => AgentError::unexpected("delete_org", &dn, err),
            })?;
        info!(dn = %dn, "Organisation deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn org_info(&mut self, id: &str) -> AgentResult<OrganisationRecord> {
        let dn = self.codec.org_dn(id)?;
        let entry = self
            .lookup_one(SearchRequest::base(&dn))?
            .ok_or_else(|| AgentError::NotFound { dn: dn.clone() })?;
        self.org_record(&entry)
    }

    #[instrument(skip(self))]
    pub fn user_info(&mut self, id: &str) -> AgentResult<UserRecord> {
        let dn = self.codec.user_dn(id)?;
        let entry = self
            .lookup_one(
                SearchRequest::base(&dn).with_filter(Filter::eq("objectClass", "organizationalPerson")),
            )?
            .ok_or_else(|| AgentError::NotFound { dn: dn.clone() })?;
        self.user_record(&entry)
    }

    /// Users whose uid or common name contains `text`, sorted by id.
    /// Empty text matches nothing.
    #[instrument(skip(self))]
    pub fn search_user(&mut self, text: &str) -> AgentResult<Vec<UserRecord>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::eq("objectClass", "person")
            .and_with(Filter::or(vec![Filter::contains("uid", text), Filter::contains("cn", text)]));
        let base = self.codec.users_dn().to_string();
        let entries = self
            .client
            .search(&SearchRequest::one_level(&base).with_filter(filter))
            .map_err(|err| AgentError::unexpected("search_user", &base, err))?;

        let mut users = entries
            .iter()
            .map(|entry| self.user_record(entry))
            .collect::<AgentResult<Vec<_>>>()?;
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    /// Organisations whose id or name contains `text`, sorted by id.
    /// Empty text matches nothing.
    #[instrument(skip(self))]
    pub fn search_org(&mut self, text: &str) -> AgentResult<Vec<OrganisationRecord>> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let filter = Filter::or(vec![Filter::contains("cn", text), Filter::contains("o", text)]);
        let base = self.codec.orgs_dn().to_string();
        let entries = self
            .client
            .search(&SearchRequest::one_level(&base).with_filter(filter))
            .map_err(|err| AgentError::unexpected("search_org", &base, err))?;

        let mut orgs = entries
            .iter()
            .map(|entry| self.org_record(entry))
            .collect::<AgentResult<Vec<_>>>()?;
        orgs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(orgs)
    }

    fn org_record(&self, entry: &Entry) -> AgentResult<OrganisationRecord> {
        Ok(OrganisationRecord {
            id: self.codec.org_id(&entry.dn)?,
            dn: entry.dn.clone(),
            fields: unpack(ORG_FIELDS, entry),
        })
    }

    fn user_record(&self, entry: &Entry) -> AgentResult<UserRecord> {
        Ok(UserRecord {
            id: self.codec.user_id(&entry.dn)?,
            dn: entry.dn.clone(),
            fields: unpack(USER_FIELDS, entry),
        })
    }
}
