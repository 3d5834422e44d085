//! In-memory editor for the Melhor Envio configuration.
//!
//! The editor holds decoded rules in editable form and rebuilds the full
//! configuration after every successful mutation, handing it to a
//! [`ConfigListener`]. The owner of the listener decides when to persist.

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::carrier::is_known_carrier;
use super::config::{MelhorEnvioConfig, mask_token};
use super::region::{StateFilter, is_known_uf};
use super::rule::{FreeShippingRule, encode_rules};
use crate::types::RowKey;

/// Receives the rebuilt configuration after each change.
pub trait ConfigListener {
    fn on_change(&mut self, config: &MelhorEnvioConfig);
}

impl<F: FnMut(&MelhorEnvioConfig)> ConfigListener for F {
    fn on_change(&mut self, config: &MelhorEnvioConfig) {
        self(config);
    }
}

/// Rejected editor input. Rejected commands leave state untouched and do
/// not notify the listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("unknown carrier: {0}")]
    UnknownCarrier(String),

    #[error("no rule with id {0}")]
    UnknownRule(RowKey),

    #[error("unknown region: {0}")]
    UnknownRegion(String),
}

/// Editable rule field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleField {
    Name,
    State,
    MinAmount,
}

/// One editor mutation, as sent by admin clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditorCommand {
    SetToken { value: String },
    SetZipCode { value: String },
    ToggleCarrier { carrier: String },
    AddRule,
    RemoveRule { id: RowKey },
    UpdateRule { id: RowKey, field: RuleField, value: String },
}

/// Editable form of a [`MelhorEnvioConfig`].
///
/// Rules keep their row keys, so a draft sent back by an admin client can be
/// edited by id.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorDraft {
    pub token: String,
    pub zip_code: String,
    pub allowed_carriers: Vec<String>,
    pub rules: Vec<FreeShippingRule>,
}

impl EditorDraft {
    /// Decode `config` into editable form.
    #[must_use]
    pub fn from_config(config: &MelhorEnvioConfig) -> Self {
        Self {
            token: config.token.clone().unwrap_or_default(),
            zip_code: config.zip_code.clone().unwrap_or_default(),
            allowed_carriers: config.allowed_carriers().to_vec(),
            rules: config.decoded_rules(),
        }
    }

    /// Encode back into a full configuration.
    #[must_use]
    pub fn to_config(&self) -> MelhorEnvioConfig {
        MelhorEnvioConfig {
            token: Some(self.token.clone()),
            zip_code: Some(self.zip_code.clone()),
            allowed_carriers: Some(self.allowed_carriers.clone()),
            rules: Some(encode_rules(&self.rules)),
        }
    }
}

impl fmt::Debug for EditorDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorDraft")
            .field("token", &mask_token(&self.token))
            .field("zip_code", &self.zip_code)
            .field("allowed_carriers", &self.allowed_carriers)
            .field("rules", &self.rules)
            .finish()
    }
}

/// Editor state for one provider configuration.
pub struct ShippingConfigEditor<L> {
    draft: EditorDraft,
    listener: L,
}

impl<L: ConfigListener> ShippingConfigEditor<L> {
    /// Load `config` into the editor. The listener is notified once with the
    /// normalized configuration.
    pub fn new(config: &MelhorEnvioConfig, listener: L) -> Self {
        Self::from_draft(EditorDraft::from_config(config), listener)
    }

    /// Resume editing a draft. The listener is notified once.
    pub fn from_draft(draft: EditorDraft, listener: L) -> Self {
        let mut editor = Self { draft, listener };
        editor.emit();
        editor
    }

    /// Rebuild the full configuration from editor state.
    #[must_use]
    pub fn config(&self) -> MelhorEnvioConfig {
        self.draft.to_config()
    }

    #[must_use]
    pub const fn draft(&self) -> &EditorDraft {
        &self.draft
    }

    /// Rules in display order.
    #[must_use]
    pub fn rules(&self) -> &[FreeShippingRule] {
        &self.draft.rules
    }

    /// Consume the editor, returning the listener.
    pub fn into_listener(self) -> L {
        self.listener
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.draft.token = token.into();
        self.emit();
    }

    pub fn set_zip_code(&mut self, zip_code: impl Into<String>) {
        self.draft.zip_code = zip_code.into();
        self.emit();
    }

    /// Allow or disallow a catalog carrier. Returns whether it is now allowed.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownCarrier`] for ids outside the catalog.
    pub fn toggle_carrier(&mut self, carrier: &str) -> Result<bool, EditorError> {
        if !is_known_carrier(carrier) {
            return Err(EditorError::UnknownCarrier(carrier.to_string()));
        }
        let allowed = if let Some(pos) = self.draft.allowed_carriers.iter().position(|c| c == carrier) {
            self.draft.allowed_carriers.remove(pos);
            false
        } else {
            self.draft.allowed_carriers.push(carrier.to_string());
            true
        };
        self.emit();
        Ok(allowed)
    }

    /// Append an unconditional rule named `Regra N`.
    pub fn add_rule(&mut self) -> RowKey {
        let rule = FreeShippingRule::unconditional(format!("Regra {}", self.draft.rules.len() + 1));
        let id = rule.id;
        self.draft.rules.push(rule);
        self.emit();
        id
    }

    /// # Errors
    ///
    /// Returns [`EditorError::UnknownRule`] if no rule has this id.
    pub fn remove_rule(&mut self, id: RowKey) -> Result<(), EditorError> {
        let pos = self.position(id)?;
        self.draft.rules.remove(pos);
        self.emit();
        Ok(())
    }

    /// Set one field of a rule.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::UnknownRule`] for a missing id and
    /// [`EditorError::UnknownRegion`] for a state that is neither a UF code
    /// nor the all-regions sentinel.
    pub fn update_rule(&mut self, id: RowKey, field: RuleField, value: &str) -> Result<(), EditorError> {
        let rule = self
            .draft
            .rules
            .iter_mut()
            .find(|rule| rule.id == id)
            .ok_or(EditorError::UnknownRule(id))?;
        match field {
            RuleField::Name => rule.name = value.to_string(),
            RuleField::MinAmount => rule.min_amount = value.to_string(),
            RuleField::State => {
                let state = StateFilter::from_code(value);
                if let Some(code) = state.code()
                    && !is_known_uf(code)
                {
                    return Err(EditorError::UnknownRegion(code.to_string()));
                }
                rule.state = state;
            }
        }
        self.emit();
        Ok(())
    }

    /// Apply a command and return the configuration it produced.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying operation.
    pub fn apply(&mut self, command: EditorCommand) -> Result<MelhorEnvioConfig, EditorError> {
        match command {
            EditorCommand::SetToken { value } => self.set_token(value),
            EditorCommand::SetZipCode { value } => self.set_zip_code(value),
            EditorCommand::ToggleCarrier { carrier } => {
                self.toggle_carrier(&carrier)?;
            }
            EditorCommand::AddRule => {
                self.add_rule();
            }
            EditorCommand::RemoveRule { id } => self.remove_rule(id)?,
            EditorCommand::UpdateRule { id, field, value } => self.update_rule(id, field, &value)?,
        }
        Ok(self.config())
    }

    fn position(&self, id: RowKey) -> Result<usize, EditorError> {
        self.draft
            .rules
            .iter()
            .position(|rule| rule.id == id)
            .ok_or(EditorError::UnknownRule(id))
    }

    fn emit(&mut self) {
        let config = self.config();
        self.listener.on_change(&config);
    }
}
