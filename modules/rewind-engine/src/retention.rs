//! Bounded retention: auto-commit the oldest staged actions once the history
//! grows past `max_age`.

use tracing::{debug, info};

use crate::config::MIN_MAX_AGE;
use crate::error::ConfigError;
use crate::fold::FoldCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    max_age: Option<usize>,
}

impl RetentionPolicy {
    pub fn new(max_age: Option<usize>) -> Result<Self, ConfigError> {
        match max_age {
            Some(max_age) if max_age < MIN_MAX_AGE => Err(ConfigError::MaxAgeTooSmall(max_age)),
            _ => Ok(Self { max_age }),
        }
    }

    pub fn max_age(&self) -> Option<usize> {
        self.max_age
    }

    /// Commit oldest actions one at a time until the bound holds or an
    /// erroring action blocks the way. Returns how many were committed.
    ///
    /// A blocked action stays staged (however long the log grows) so it can
    /// be inspected until a reducer replacement or toggle clears its error.
    pub fn enforce<S: Clone>(&self, cache: &mut FoldCache<S>) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };

        let mut committed = 0;
        while cache.lifted().staged_len() > max_age {
            match cache.commit_oldest() {
                Some(id) => {
                    debug!(action_id = id, "auto-committed action");
                    committed += 1;
                }
                None => {
                    debug!(
                        staged = cache.lifted().staged_len(),
                        max_age, "auto-commit blocked by an erroring action"
                    );
                    break;
                }
            }
        }

        if committed > 0 {
            info!(committed, max_age, "auto-commit trimmed history");
        }
        committed
    }
}
