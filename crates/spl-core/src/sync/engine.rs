//! SyncEngine implementation
//!
//! The SyncEngine diffs one object kind between a source and a destination
//! connection and reconciles the destination in three passes (create,
//! update, delete), re-diffing after each pass.

use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::SyncConfig;
use crate::connection::ConnectionAdapter;
use crate::diff::{ChangeKind, EntityDiff, PropertyChange};
use crate::objects::{DEFAULT_APP, Inventory, ObjectKind, ObjectList, is_set};
use crate::prompt::{Prompter, pick};
use crate::Result;

use super::report::SyncReport;

/// Which passes to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    /// Log every decision, write nothing
    pub simulate: bool,
}

/// Reconciles objects from `src` onto `dest`.
pub struct SyncEngine<'a> {
    pub(super) src: &'a ConnectionAdapter,
    pub(super) dest: &'a ConnectionAdapter,
    prompter: &'a dyn Prompter,
    interactive: bool,
    config: SyncConfig,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        src: &'a ConnectionAdapter,
        dest: &'a ConnectionAdapter,
        prompter: &'a dyn Prompter,
        interactive: bool,
        config: &SyncConfig,
    ) -> Self {
        info!(
            "Creating sync management from '{}' to '{}'.",
            src.name(),
            dest.name()
        );
        Self {
            src,
            dest,
            prompter,
            interactive,
            config: config.clone(),
        }
    }

    /// Namespace-filtered lists of both sides and their diff.
    pub async fn diff(&self, kind: ObjectKind) -> Result<(ObjectList, ObjectList, EntityDiff)> {
        let src = self.src.objects(kind).await?;
        let dest = self.dest.objects(kind).await?;
        let diff = EntityDiff::compute(&src.entities, &dest.entities);
        Ok((src, dest, diff))
    }

    /// Run the requested passes for one kind.
    pub async fn sync(&self, kind: ObjectKind, options: SyncOptions) -> Result<SyncReport> {
        info!(
            "Differential synchronization of '{}' from '{}' to '{}' (create: {}, update: {}, delete: {}, simulate: {})",
            kind.name(),
            self.src.name(),
            self.dest.name(),
            options.create,
            options.update,
            options.delete,
            options.simulate
        );
        let mut report = SyncReport::new();

        let (src_list, mut dest_list, mut diff) = self.diff(kind).await?;
        info!("{}", diff.summary());

        if options.create {
            self.create(&src_list, &diff, options.simulate, &mut report)
                .await?;
            if options.update || options.delete {
                (_, dest_list, diff) = self.diff(kind).await?;
            }
        }
        if options.update {
            self.update(&mut dest_list, &diff, options.simulate, &mut report)
                .await?;
            if options.delete {
                (_, dest_list, diff) = self.diff(kind).await?;
            }
        }
        if options.delete {
            self.delete(&dest_list, &diff, options.simulate, &mut report)
                .await?;
        }

        info!(
            "Finished '{}' sync: {} actions, {} skipped, {} errors",
            kind.name(),
            report.actions.len(),
            report.skipped.len(),
            report.errors.len()
        );
        Ok(report)
    }

    fn choose(&self, message: &str, names: &[String]) -> Result<Vec<String>> {
        if !self.interactive || names.is_empty() {
            return Ok(names.to_vec());
        }
        let chosen = self
            .prompter
            .multi_select(message, names, &vec![false; names.len()])?;
        Ok(pick(names, &chosen))
    }

    async fn create(
        &self,
        src_list: &ObjectList,
        diff: &EntityDiff,
        simulate: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        let kind = src_list.kind;
        if diff.missing.is_empty() {
            return Ok(());
        }
        info!(
            "Detected {} objects {:?} on {} not existing on {}.",
            kind.name().to_lowercase(),
            diff.missing,
            self.src.name(),
            self.dest.name()
        );

        let names = self.choose(
            &format!("Select the {} you want to create:", kind.name()),
            &diff.missing,
        )?;
        if names.is_empty() {
            return Ok(());
        }
        let inventory = self.dest.inventory().await?;

        for name in names {
            let Some(reference) = src_list.get(&name) else {
                continue;
            };
            if !self.check_create(kind, &name, simulate, report)? {
                continue;
            }

            let mut args = src_list.create_args(reference, &inventory);
            if kind == ObjectKind::Users {
                args.insert(
                    "password".to_string(),
                    Value::String(self.config.default_user_password.clone()),
                );
            }

            match self.dest.service().create(kind.endpoint(), &name, &args).await {
                Ok(()) => report.action(format!(
                    "Created {} '{}' on {}",
                    kind.name(),
                    name,
                    self.dest.name()
                )),
                Err(e) => {
                    error!("Failed to create {} '{}': {}", kind.name(), name, e);
                    report.error(format!("create {} '{}': {}", kind.name(), name, e));
                }
            }
        }
        Ok(())
    }

    fn check_create(
        &self,
        kind: ObjectKind,
        name: &str,
        simulate: bool,
        report: &mut SyncReport,
    ) -> Result<bool> {
        if self.interactive
            && !self.prompter.confirm(
                &format!(
                    "Do you want to create {} '{}' on {}?",
                    kind.name(),
                    name,
                    self.dest.authority()
                ),
                true,
            )?
        {
            report.skip(format!("Declined {} creation of '{}'", kind.name(), name));
            return Ok(false);
        }
        if simulate {
            info!("Simulated {} creation of '{}'.", kind.name(), name);
            report.skip(format!("Simulated {} creation of '{}'", kind.name(), name));
            return Ok(false);
        }
        info!(
            "Creating {} entity '{}' on {}.",
            kind.name(),
            name,
            self.dest.authority()
        );
        Ok(true)
    }

    async fn update(
        &self,
        dest_list: &mut ObjectList,
        diff: &EntityDiff,
        simulate: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        if diff.changes.is_empty() {
            return Ok(());
        }
        let kind = dest_list.kind;
        let inventory = self.dest.inventory().await?;

        for change in &diff.changes {
            let Some(dest_entity) = dest_list.get(&change.entity) else {
                continue;
            };
            if !self.check_update(kind, change, dest_entity, &inventory, simulate, report)? {
                continue;
            }

            let value = updated_value(change, dest_entity.get(&change.property));
            let mut args = Map::new();
            args.insert(change.property.clone(), value.clone());

            match self
                .dest
                .service()
                .update(kind.endpoint(), &change.entity, &args)
                .await
            {
                Ok(()) => {
                    report.action(format!("Updated {}", change));
                    if let Some(entity) = dest_list
                        .entities
                        .iter_mut()
                        .find(|e| e.name == change.entity)
                    {
                        entity.content.insert(change.property.clone(), value);
                    }
                }
                Err(e) => {
                    error!(
                        "Failed to update {} '{}' prop '{}': {}",
                        kind.name(),
                        change.entity,
                        change.property,
                        e
                    );
                    report.error(format!("update {}: {}", change, e));
                }
            }
        }
        Ok(())
    }

    /// Whether a property change should be applied to the destination.
    pub(crate) fn check_update(
        &self,
        kind: ObjectKind,
        change: &PropertyChange,
        dest_entity: &spl_client::Entity,
        inventory: &Inventory,
        simulate: bool,
        report: &mut SyncReport,
    ) -> Result<bool> {
        let prop = change.property.as_str();
        let src_value = change.src_value().filter(|v| is_set(v));
        let dest_value = change.dest_value().filter(|v| is_set(v));
        let describe = format!(
            "{} update '{}' for '{}' from '{}' to '{}'",
            kind.name(),
            change.entity,
            prop,
            show(dest_value),
            show(src_value)
        );

        let exposed = dest_entity.get(prop).is_some_and(is_set)
            && !kind.sync_exclude().contains(&prop)
            && (!dest_entity.fields.is_declared() || dest_entity.fields.accepts(prop));
        if !exposed || (src_value.is_none() && dest_value.is_none()) {
            info!("Ignoring {}.", describe);
            report.skip(format!("Ignored {describe}"));
            return Ok(false);
        }

        if let (Some(valid), Some(value)) = (inventory.valid_values(prop), src_value) {
            let known = match value {
                Value::String(s) => valid.contains(s),
                _ => false,
            };
            if !known {
                let what = if prop == DEFAULT_APP { "default app" } else { prop };
                error!(
                    "Can not assign {} '{}' to {} '{}' as it does not exist on destination instance!",
                    what,
                    show(Some(value)),
                    kind.name(),
                    change.entity
                );
                report.skip(format!("Unresolvable {describe}"));
                return Ok(false);
            }
        }

        if self.interactive {
            let question = match (dest_value, src_value) {
                (None, Some(src)) => format!(
                    "Do you want to set {} '{}' prop named '{}' to '{}'?",
                    kind.name(),
                    change.entity,
                    prop,
                    show(Some(src))
                ),
                (Some(dest), None) => format!(
                    "Do you want to unset {} '{}' prop named '{}' of '{}'?",
                    kind.name(),
                    change.entity,
                    prop,
                    show(Some(dest))
                ),
                _ => format!(
                    "Do you want to update {} '{}' prop named '{}' from '{}' to '{}'?",
                    kind.name(),
                    change.entity,
                    prop,
                    show(dest_value),
                    show(src_value)
                ),
            };
            if !self.prompter.confirm(&question, false)? {
                info!("Skipping {}.", describe);
                report.skip(format!("Declined {describe}"));
                return Ok(false);
            }
        }

        if simulate {
            info!("Simulated {}.", describe);
            report.skip(format!("Simulated {describe}"));
            return Ok(false);
        }

        match (dest_value, src_value) {
            (None, Some(src)) => info!(
                "Setting {} entity '{}' prop '{}' with value '{}'.",
                kind.name(),
                change.entity,
                prop,
                show(Some(src))
            ),
            (Some(dest), None) => info!(
                "Unsetting {} entity '{}' prop '{}' of value '{}'.",
                kind.name(),
                change.entity,
                prop,
                show(Some(dest))
            ),
            _ => info!("Updating {}.", describe),
        }
        Ok(true)
    }

    async fn delete(
        &self,
        dest_list: &ObjectList,
        diff: &EntityDiff,
        simulate: bool,
        report: &mut SyncReport,
    ) -> Result<()> {
        let kind = dest_list.kind;
        if diff.extra.is_empty() {
            return Ok(());
        }
        info!(
            "Detected {} objects '{}' on {} not existing on {}.",
            kind.name().to_lowercase(),
            diff.extra.join(", "),
            self.dest.name(),
            self.src.name()
        );

        let names = self.choose(
            &format!("Select the {} you want to remove:", kind.name()),
            &diff.extra,
        )?;
        for name in names {
            if self.interactive
                && !self.prompter.confirm(
                    &format!(
                        "Do you want to delete {} '{}' on {}?",
                        kind.name(),
                        name,
                        self.dest.authority()
                    ),
                    false,
                )?
            {
                report.skip(format!("Declined {} deletion of '{}'", kind.name(), name));
                continue;
            }
            if simulate {
                info!("Simulated {} deletion of '{}'.", kind.name(), name);
                report.skip(format!("Simulated {} deletion of '{}'", kind.name(), name));
                continue;
            }

            info!("Deleting {} '{}' on {}", kind.name(), name, self.dest.authority());
            match self.dest.service().delete(kind.endpoint(), &name).await {
                Ok(()) => report.action(format!(
                    "Deleted {} '{}' on {}",
                    kind.name(),
                    name,
                    self.dest.name()
                )),
                Err(e) => {
                    error!("Failed to delete {} '{}': {}", kind.name(), name, e);
                    report.error(format!("delete {} '{}': {}", kind.name(), name, e));
                }
            }
        }
        Ok(())
    }
}

/// New destination value realizing `change`.
fn updated_value(change: &PropertyChange, current: Option<&Value>) -> Value {
    let mut items = match current {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) if !s.is_empty() => vec![Value::String(s.clone())],
        _ => Vec::new(),
    };
    match &change.kind {
        ChangeKind::Set { src } | ChangeKind::Changed { src, .. } => src.clone(),
        ChangeKind::Unset { .. } => Value::String(String::new()),
        ChangeKind::ItemMissing { value } => {
            items.push(value.clone());
            Value::Array(items)
        }
        ChangeKind::ItemExtra { value } => {
            if let Some(pos) = items.iter().position(|v| v == value) {
                items.remove(pos);
            }
            Value::Array(items)
        }
    }
}

fn show(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
