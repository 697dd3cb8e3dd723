//! LiftedState: the full debuggable history around a plain application state.
//!
//! This is the unit that is published, exported and imported. Its serialized
//! form (camelCase keys) is the persisted wire shape.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HistoryError, HistoryResult};
use crate::types::{Action, ActionId, ComputedEntry, PerformedAction, INIT_ACTION_ID};

// ---------------------------------------------------------------------------
// LiftedState
// ---------------------------------------------------------------------------

/// Cached fold results, parallel to `staged_action_ids`.
///
/// A persistent vector of shared entries: cloning is O(1), and pushing onto a
/// cache that a published snapshot still holds copies at most one chunk of
/// entry pointers. States are never cloned by structural sharing.
pub type ComputedStates<S> = im::Vector<Arc<ComputedEntry<S>>>;

/// Every recorded action by id. Persistent, so snapshots share it.
pub type ActionLog = im::OrdMap<ActionId, PerformedAction>;

/// True when both caches hold the very same entries, i.e. nothing between the
/// two was recomputed.
pub fn same_entries<S>(left: &ComputedStates<S>, right: &ComputedStates<S>) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right.iter())
            .all(|(left, right)| Arc::ptr_eq(left, right))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiftedState<S> {
    pub actions_by_id: ActionLog,
    pub next_action_id: ActionId,
    /// Linear, uncommitted history. Position 0 is always the INIT action.
    pub staged_action_ids: Vec<ActionId>,
    pub skipped_action_ids: BTreeSet<ActionId>,
    /// Fold seed: everything before `staged_action_ids[0]`.
    pub committed_state: S,
    pub current_state_index: usize,
    /// Shared with published snapshots; an untouched cache keeps its identity
    /// (`same_entries`).
    pub computed_states: ComputedStates<S>,
    #[serde(default)]
    pub monitor_state: Value,
}

impl<S: Clone> LiftedState<S> {
    /// A fresh generation seeded with `committed_state`: only the INIT action
    /// is staged and the cache holds the seed itself.
    pub fn new(committed_state: S) -> Self {
        Self {
            actions_by_id: ActionLog::unit(INIT_ACTION_ID, PerformedAction::init()),
            next_action_id: INIT_ACTION_ID + 1,
            staged_action_ids: vec![INIT_ACTION_ID],
            skipped_action_ids: BTreeSet::new(),
            computed_states: ComputedStates::unit(Arc::new(ComputedEntry::ok(
                committed_state.clone(),
            ))),
            committed_state,
            current_state_index: 0,
            monitor_state: Value::Null,
        }
    }
}

impl<S> LiftedState<S> {
    /// The publicly observable entry. Assumes the aggregate is well-formed.
    pub fn current_entry(&self) -> &ComputedEntry<S> {
        &self.computed_states[self.current_state_index]
    }

    pub fn current_state(&self) -> &S {
        &self.current_entry().state
    }

    pub fn position_of(&self, id: ActionId) -> Option<usize> {
        self.staged_action_ids.iter().position(|staged| *staged == id)
    }

    pub fn is_skipped(&self, id: ActionId) -> bool {
        self.skipped_action_ids.contains(&id)
    }

    pub fn staged_len(&self) -> usize {
        self.staged_action_ids.len()
    }

    /// Index of the newest staged entry.
    pub fn last_index(&self) -> usize {
        self.staged_action_ids.len().saturating_sub(1)
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions_by_id.get(&id).map(|performed| &performed.action)
    }

    /// Check the structural invariants an engine relies on. Cached values are
    /// not re-derived: an imported cache is trusted as authoritative.
    pub fn validate(&self) -> HistoryResult<()> {
        let malformed = |reason: String| Err(HistoryError::MalformedSnapshot(reason));

        if self.staged_action_ids.first() != Some(&INIT_ACTION_ID) {
            return malformed("stagedActionIds must start with the INIT action".into());
        }
        if self.computed_states.len() != self.staged_action_ids.len() {
            return malformed(format!(
                "computedStates has {} entries but stagedActionIds has {}",
                self.computed_states.len(),
                self.staged_action_ids.len()
            ));
        }
        if self.current_state_index >= self.staged_action_ids.len() {
            return malformed(format!(
                "currentStateIndex {} out of range (staged actions: {})",
                self.current_state_index,
                self.staged_action_ids.len()
            ));
        }
        if self.is_skipped(INIT_ACTION_ID) {
            return malformed("the INIT action cannot be skipped".into());
        }

        let mut seen = BTreeSet::new();
        for id in &self.staged_action_ids {
            if !seen.insert(*id) {
                return malformed(format!("action {id} is staged twice"));
            }
            if !self.actions_by_id.contains_key(id) {
                return malformed(format!("staged action {id} is missing from actionsById"));
            }
        }

        if let Some((max_id, _)) = self.actions_by_id.get_max() {
            if self.next_action_id <= *max_id {
                return malformed(format!(
                    "nextActionId {} would reuse existing action {max_id}",
                    self.next_action_id
                ));
            }
        }

        Ok(())
    }
}

impl<S: Serialize> LiftedState<S> {
    /// Serialize to the plain structured document used for export.
    pub fn to_document(&self) -> HistoryResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl<S: DeserializeOwned> LiftedState<S> {
    /// Parse and validate an exported document.
    pub fn from_document(document: Value) -> HistoryResult<Self> {
        let lifted: Self = serde_json::from_value(document)?;
        lifted.validate()?;
        Ok(lifted)
    }
}

// ---------------------------------------------------------------------------
// LiftedAction
// ---------------------------------------------------------------------------

/// `type` strings owned by the engine. Everything else is a monitor action.
pub const LIFTED_ACTION_TYPES: &[&str] = &[
    "PERFORM_ACTION",
    "RESET",
    "ROLLBACK",
    "COMMIT",
    "SWEEP",
    "TOGGLE_ACTION",
    "JUMP_TO_STATE",
    "IMPORT_STATE",
];

pub fn is_lifted_type(kind: &str) -> bool {
    LIFTED_ACTION_TYPES.contains(&kind)
}

/// History-level actions understood by the engine.
///
/// Replacing the reducer is not here: a function has no wire form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiftedAction<S> {
    PerformAction {
        action: Action,
        timestamp: DateTime<Utc>,
    },
    Reset,
    Rollback,
    Commit,
    Sweep,
    ToggleAction {
        id: ActionId,
    },
    JumpToState {
        index: usize,
    },
    ImportState {
        #[serde(rename = "nextLiftedState")]
        next_lifted_state: Box<LiftedState<S>>,
    },
}

impl<S> LiftedAction<S> {
    pub fn perform(action: Action) -> Self {
        LiftedAction::PerformAction {
            action,
            timestamp: Utc::now(),
        }
    }

    /// The `type` string of this action on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            LiftedAction::PerformAction { .. } => "PERFORM_ACTION",
            LiftedAction::Reset => "RESET",
            LiftedAction::Rollback => "ROLLBACK",
            LiftedAction::Commit => "COMMIT",
            LiftedAction::Sweep => "SWEEP",
            LiftedAction::ToggleAction { .. } => "TOGGLE_ACTION",
            LiftedAction::JumpToState { .. } => "JUMP_TO_STATE",
            LiftedAction::ImportState { .. } => "IMPORT_STATE",
        }
    }
}

impl<S: DeserializeOwned> LiftedAction<S> {
    /// Decode an action that carries a lifted `type`.
    ///
    /// Returns `Ok(None)` for untyped actions and for monitor actions. A lifted
    /// type whose payload does not match its shape is an error.
    ///
    /// Fields are decoded one by one straight from JSON values; buffering the
    /// whole record (as a tagged-enum derive does) loses integer map keys.
    pub fn from_action(action: &Action) -> HistoryResult<Option<Self>> {
        let Some(kind) = action.kind() else {
            return Ok(None);
        };

        let field = |name: &str| action.get(name).cloned().unwrap_or(Value::Null);

        let lifted = match kind {
            "PERFORM_ACTION" => {
                let inner = decode_field(kind, field("action"))?;
                let timestamp = match action.get("timestamp") {
                    Some(value) => decode_field(kind, value.clone())?,
                    None => Utc::now(),
                };
                LiftedAction::PerformAction {
                    action: inner,
                    timestamp,
                }
            }
            "RESET" => LiftedAction::Reset,
            "ROLLBACK" => LiftedAction::Rollback,
            "COMMIT" => LiftedAction::Commit,
            "SWEEP" => LiftedAction::Sweep,
            "TOGGLE_ACTION" => LiftedAction::ToggleAction {
                id: decode_field(kind, field("id"))?,
            },
            "JUMP_TO_STATE" => LiftedAction::JumpToState {
                index: decode_field(kind, field("index"))?,
            },
            "IMPORT_STATE" => LiftedAction::ImportState {
                next_lifted_state: Box::new(decode_field(kind, field("nextLiftedState"))?),
            },
            _ => return Ok(None),
        };

        Ok(Some(lifted))
    }
}

fn decode_field<T: DeserializeOwned>(kind: &str, value: Value) -> HistoryResult<T> {
    serde_json::from_value(value).map_err(|source| HistoryError::MalformedLiftedAction {
        kind: kind.to_string(),
        source,
    })
}

impl<'de, S: DeserializeOwned> Deserialize<'de> for LiftedAction<S> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        let action = Action::try_from(value).map_err(D::Error::custom)?;
        match Self::from_action(&action).map_err(D::Error::custom)? {
            Some(lifted) => Ok(lifted),
            None => Err(D::Error::custom(format!(
                "not a lifted action: {}",
                action.kind().unwrap_or("<untyped>")
            ))),
        }
    }
}
