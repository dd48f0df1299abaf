use std::collections::BTreeSet;

use tracing::debug;

use flexpage_core::{ConditionId, PageId};
use flexpage_storage::{ConditionRow, ConditionStore, StorageError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub updated: usize,
    pub inserted: usize,
    pub deleted: usize,
}

/// Make the stored rows of one condition table for `page_id` match
/// `conditions` exactly: update rows found by natural key, insert the rest,
/// then drop whatever was not touched.
pub fn reconcile<S, C>(
    store: &mut S,
    page_id: PageId,
    conditions: &[C],
) -> Result<ReconcileOutcome, StorageError>
where
    S: ConditionStore,
    C: ConditionRow,
{
    store.atomically(|store| {
        let mut outcome = ReconcileOutcome::default();
        let mut kept: BTreeSet<ConditionId> = BTreeSet::new();

        for condition in conditions {
            match store.find_condition_id::<C>(page_id, condition.natural_key())? {
                Some(id) => {
                    store.update_condition(id, page_id, condition)?;
                    outcome.updated += 1;
                    kept.insert(id);
                }
                None => {
                    kept.insert(store.insert_condition(page_id, condition)?);
                    outcome.inserted += 1;
                }
            }
        }

        let kept: Vec<ConditionId> = kept.into_iter().collect();
        outcome.deleted = store.delete_conditions_except::<C>(page_id, &kept)?;

        debug!(
            table = C::TABLE,
            page = %page_id,
            updated = outcome.updated,
            inserted = outcome.inserted,
            deleted = outcome.deleted,
            "reconciled page conditions"
        );
        Ok::<_, StorageError>(outcome)
    })
}
