use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::papers::dto::CompletionEntry;
use crate::papers::key::{InvalidKey, PaperKey};
use crate::papers::repo::CompletionStore;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),
    #[error("Score must be between 0 and 100, got {0}")]
    InvalidScore(i32),
    #[error("Store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

/// Update-or-insert for one natural key. Lookup-before-insert keeps at
/// most one record per key; the timezone-less variant of a paper never
/// matches its timezone-bearing siblings.
pub async fn upsert_completion(
    store: &dyn CompletionStore,
    user_id: Uuid,
    key: &PaperKey,
    is_completed: bool,
    score: Option<i32>,
) -> Result<(), CompletionError> {
    if let Some(s) = score {
        if !(0..=100).contains(&s) {
            return Err(CompletionError::InvalidScore(s));
        }
    }

    let existing = store
        .find(user_id, key)
        .await
        .map_err(CompletionError::StoreUnavailable)?;

    match existing {
        Some(record) => {
            store
                .update(record.id, is_completed, score)
                .await
                .map_err(CompletionError::StoreUnavailable)?;
            debug!(%user_id, key = %key, "completion updated");
        }
        None => {
            store
                .insert(user_id, key, is_completed, score)
                .await
                .map_err(CompletionError::StoreUnavailable)?;
            debug!(%user_id, key = %key, "completion inserted");
        }
    }
    Ok(())
}

/// Applies the entries one at a time. Best effort: entries already
/// applied stay applied when a later one fails.
pub async fn bulk_upsert_completion(
    store: &dyn CompletionStore,
    user_id: Uuid,
    entries: &BTreeMap<String, CompletionEntry>,
) -> Result<usize, CompletionError> {
    let mut applied = 0;
    for (raw, entry) in entries {
        let key: PaperKey = raw.parse()?;
        upsert_completion(store, user_id, &key, entry.is_completed, entry.score).await?;
        applied += 1;
    }
    info!(%user_id, applied, "bulk completion applied");
    Ok(applied)
}

pub async fn list_completion(
    store: &dyn CompletionStore,
    user_id: Uuid,
) -> Result<HashMap<String, CompletionEntry>, CompletionError> {
    let records = store
        .list_by_user(user_id)
        .await
        .map_err(CompletionError::StoreUnavailable)?;

    Ok(records
        .into_iter()
        .map(|r| {
            let entry = CompletionEntry {
                is_completed: r.is_completed,
                score: r.score,
            };
            (r.key().to_string(), entry)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::papers::repo::MemoryCompletionStore;

    fn biology_key() -> PaperKey {
        PaperKey::new("Biology".into(), 2023, "May".into(), "Paper1".into(), None)
    }

    #[tokio::test]
    async fn upsert_twice_keeps_a_single_record() {
        let store = MemoryCompletionStore::default();
        let user_id = Uuid::new_v4();
        let key = biology_key();

        upsert_completion(&store, user_id, &key, false, None)
            .await
            .expect("first upsert");
        upsert_completion(&store, user_id, &key, true, Some(85))
            .await
            .expect("second upsert");

        let map = list_completion(&store, user_id).await.expect("list");
        assert_eq!(map.len(), 1);
        let entry = &map["Biology-2023-May-Paper1"];
        assert!(entry.is_completed);
        assert_eq!(entry.score, Some(85));
    }

    #[tokio::test]
    async fn timezone_variants_never_cross_match() {
        let store = MemoryCompletionStore::default();
        let user_id = Uuid::new_v4();
        let tz1 = PaperKey::new(
            "Biology".into(),
            2023,
            "May".into(),
            "Paper1".into(),
            Some("TZ1".into()),
        );
        let plain = biology_key();

        upsert_completion(&store, user_id, &tz1, true, Some(90))
            .await
            .expect("tz upsert");
        upsert_completion(&store, user_id, &plain, false, None)
            .await
            .expect("plain upsert");

        let map = list_completion(&store, user_id).await.expect("list");
        assert_eq!(map.len(), 2);
        assert_eq!(map["Biology-2023-May-Paper1-TZ1"].score, Some(90));
        assert!(!map["Biology-2023-May-Paper1"].is_completed);

        // Updating the timezone-less record leaves the TZ1 one alone.
        upsert_completion(&store, user_id, &plain, true, Some(40))
            .await
            .expect("plain update");
        let map = list_completion(&store, user_id).await.expect("list");
        assert_eq!(map.len(), 2);
        assert_eq!(map["Biology-2023-May-Paper1-TZ1"].score, Some(90));
        assert_eq!(map["Biology-2023-May-Paper1"].score, Some(40));
    }

    #[tokio::test]
    async fn empty_timezone_matches_the_absent_variant() {
        let store = MemoryCompletionStore::default();
        let user_id = Uuid::new_v4();

        upsert_completion(&store, user_id, &biology_key(), false, None)
            .await
            .expect("plain upsert");

        let empty_tz = PaperKey::new(
            "Biology".into(),
            2023,
            "May".into(),
            "Paper1".into(),
            Some(String::new()),
        );
        upsert_completion(&store, user_id, &empty_tz, true, Some(70))
            .await
            .expect("empty tz upsert");

        let map = list_completion(&store, user_id).await.expect("list");
        assert_eq!(map.len(), 1);
        assert_eq!(map["Biology-2023-May-Paper1"].score, Some(70));
    }

    #[tokio::test]
    async fn bulk_inserts_then_updates_in_place() {
        let store = MemoryCompletionStore::default();
        let user_id = Uuid::new_v4();

        let mut entries = BTreeMap::new();
        entries.insert(
            "Biology-2023-May-Paper1".to_string(),
            CompletionEntry {
                is_completed: true,
                score: Some(85),
            },
        );
        entries.insert(
            "Chemistry-2022-Nov-Paper2-TZ2".to_string(),
            CompletionEntry {
                is_completed: false,
                score: None,
            },
        );

        let applied = bulk_upsert_completion(&store, user_id, &entries)
            .await
            .expect("bulk");
        assert_eq!(applied, 2);
        assert_eq!(list_completion(&store, user_id).await.unwrap().len(), 2);

        // Re-running updates in place, no duplication.
        entries.get_mut("Chemistry-2022-Nov-Paper2-TZ2").unwrap().score = Some(55);
        let applied = bulk_upsert_completion(&store, user_id, &entries)
            .await
            .expect("bulk again");
        assert_eq!(applied, 2);

        let map = list_completion(&store, user_id).await.expect("list");
        assert_eq!(map.len(), 2);
        assert_eq!(map["Chemistry-2022-Nov-Paper2-TZ2"].score, Some(55));
    }

    #[tokio::test]
    async fn bulk_failure_keeps_earlier_entries() {
        let store = MemoryCompletionStore::default();
        let user_id = Uuid::new_v4();

        // BTreeMap iterates in key order, so the valid entry runs first.
        let mut entries = BTreeMap::new();
        entries.insert(
            "Biology-2023-May-Paper1".to_string(),
            CompletionEntry {
                is_completed: true,
                score: None,
            },
        );
        entries.insert(
            "zzz-not-a-key".to_string(),
            CompletionEntry {
                is_completed: true,
                score: None,
            },
        );

        let err = bulk_upsert_completion(&store, user_id, &entries)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidKey(_)));

        let map = list_completion(&store, user_id).await.expect("list");
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("Biology-2023-May-Paper1"));
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected_before_writing() {
        let store = MemoryCompletionStore::default();
        let user_id = Uuid::new_v4();

        for bad in [-1, 101] {
            let err = upsert_completion(&store, user_id, &biology_key(), true, Some(bad))
                .await
                .unwrap_err();
            assert!(matches!(err, CompletionError::InvalidScore(_)));
        }
        assert!(list_completion(&store, user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_an_empty_user_yields_an_empty_map() {
        let store = MemoryCompletionStore::default();
        let map = list_completion(&store, Uuid::new_v4()).await.expect("list");
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn records_are_scoped_per_user() {
        let store = MemoryCompletionStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        upsert_completion(&store, alice, &biology_key(), true, Some(95))
            .await
            .expect("alice upsert");
        upsert_completion(&store, bob, &biology_key(), false, None)
            .await
            .expect("bob upsert");

        let alice_map = list_completion(&store, alice).await.expect("list");
        let bob_map = list_completion(&store, bob).await.expect("list");
        assert_eq!(alice_map["Biology-2023-May-Paper1"].score, Some(95));
        assert_eq!(bob_map["Biology-2023-May-Paper1"].score, None);
    }
}
