//! Curation indexer
//!
//! Home and gallery placements share one ordered table. Home owns positions 0..100 and
//! gallery 100..200, and an analysis id appears at most once across both.

use logoscope_core::{
    AnalysisStatus, AppError, CurationEntry, CurationList, CurationSlot, Requester,
};
use logoscope_db::{AnalysisStore, CurationStore};
use logoscope_storage::Storage;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Turn the two requested lists into slots.
///
/// Capacities apply to the lists as given. After that, duplicates inside a list keep
/// their first occurrence and an id in both lists stays on home.
pub fn plan_slots(home: &[Uuid], gallery: &[Uuid]) -> Result<Vec<CurationSlot>, AppError> {
    for (list, ids) in [(CurationList::Home, home), (CurationList::Gallery, gallery)] {
        if ids.len() > list.capacity() {
            return Err(AppError::Validation(format!(
                "{} holds at most {} analyses, got {}",
                list,
                list.capacity(),
                ids.len()
            )));
        }
    }

    let mut seen = HashSet::new();
    let home: Vec<Uuid> = home.iter().copied().filter(|id| seen.insert(*id)).collect();
    let gallery: Vec<Uuid> = gallery.iter().copied().filter(|id| seen.insert(*id)).collect();

    let place = |list: CurationList, ids: Vec<Uuid>| {
        let start = list.positions().start;
        ids.into_iter()
            .zip(start..)
            .map(|(analysis_id, position)| CurationSlot {
                position,
                analysis_id,
            })
            .collect::<Vec<_>>()
    };

    let mut slots = place(CurationList::Home, home);
    slots.extend(place(CurationList::Gallery, gallery));
    Ok(slots)
}

#[derive(Clone)]
pub struct CurationService {
    curation: Arc<dyn CurationStore>,
    analyses: Arc<dyn AnalysisStore>,
    durable: Arc<dyn Storage>,
    asset_url_ttl: Duration,
}

impl CurationService {
    pub fn new(
        curation: Arc<dyn CurationStore>,
        analyses: Arc<dyn AnalysisStore>,
        durable: Arc<dyn Storage>,
        asset_url_ttl: Duration,
    ) -> Self {
        Self {
            curation,
            analyses,
            durable,
            asset_url_ttl,
        }
    }

    /// Replace both lists. A rejected request leaves the previous assignment intact.
    #[tracing::instrument(skip(self, requester, home, gallery), fields(home = home.len(), gallery = gallery.len()))]
    pub async fn set_curation(
        &self,
        requester: &Requester,
        home: &[Uuid],
        gallery: &[Uuid],
    ) -> Result<Vec<CurationSlot>, AppError> {
        if !requester.is_admin {
            return Err(AppError::Forbidden("Administrator role required".to_string()));
        }

        let slots = plan_slots(home, gallery)?;
        for slot in &slots {
            let eligible = self
                .analyses
                .get(slot.analysis_id)
                .await?
                .is_some_and(|a| !a.is_deleted() && a.status == AnalysisStatus::Completed);
            if !eligible {
                return Err(AppError::Validation(format!(
                    "Analysis {} is not a completed analysis",
                    slot.analysis_id
                )));
            }
        }

        self.curation.replace_all(&slots).await?;
        tracing::info!(slots = slots.len(), "Curation replaced");
        Ok(slots)
    }

    /// Public listing for one range, in position order.
    pub async fn list(&self, list: CurationList) -> Result<Vec<CurationEntry>, AppError> {
        let rows = self.curation.list_range(list.positions()).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for (slot, analysis) in rows {
            let asset_url = match self
                .durable
                .get_presigned_url(&analysis.asset_key, self.asset_url_ttl)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(error = %e, analysis_id = %analysis.id, "Failed to presign curated asset");
                    None
                }
            };
            let report = analysis.result.as_ref();
            entries.push(CurationEntry {
                position: slot.position,
                analysis_id: analysis.id,
                name: analysis.display.name.clone(),
                author: analysis.display.author.clone(),
                overall_score: report.map(|r| r.overall_score),
                rating: report.map(|r| r.rating),
                asset_url,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{completed_analysis, MemoryStorage};
    use logoscope_core::Tier;
    use logoscope_db::test_helpers::InMemoryStore;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn admin() -> Requester {
        Requester {
            account_id: Uuid::new_v4(),
            is_admin: true,
        }
    }

    fn seed_completed(store: &InMemoryStore, n: usize) -> Vec<Uuid> {
        (0..n)
            .map(|_| {
                let analysis = completed_analysis(Uuid::new_v4(), Tier::Paid);
                let id = analysis.id;
                store.seed_analysis(analysis);
                id
            })
            .collect()
    }

    fn service(store: &InMemoryStore) -> CurationService {
        CurationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(MemoryStorage::new()),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_id_in_both_lists_resolves_to_home() {
        let shared = Uuid::new_v4();
        let other = Uuid::new_v4();
        let slots = plan_slots(&[shared], &[shared, other]).unwrap();

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], CurationSlot { position: 0, analysis_id: shared });
        assert_eq!(slots[1], CurationSlot { position: 100, analysis_id: other });
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let slots = plan_slots(&[a, b, a], &[]).unwrap();
        assert_eq!(
            slots.iter().map(|s| s.analysis_id).collect::<Vec<_>>(),
            vec![a, b]
        );
    }

    #[test]
    fn test_capacity_counts_ids_as_given() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert!(matches!(
            plan_slots(&[a, b, c, a], &[]),
            Err(AppError::Validation(_))
        ));

        let mut gallery = ids(6);
        gallery.push(a);
        assert!(matches!(
            plan_slots(&[a], &gallery),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_capacity_limits() {
        assert!(plan_slots(&ids(3), &ids(6)).is_ok());
        assert!(matches!(plan_slots(&ids(4), &[]), Err(AppError::Validation(_))));
        assert!(matches!(plan_slots(&[], &ids(7)), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rejected_request_keeps_prior_assignment() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let completed = seed_completed(&store, 5);

        service
            .set_curation(&admin(), &completed[..2], &completed[2..3])
            .await
            .unwrap();
        let before = store.list_all().await.unwrap();

        let err = service
            .set_curation(&admin(), &completed[..4], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.list_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_only_completed_analyses_can_be_curated() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let pending = crate::test_helpers::analysis_fixture(Uuid::new_v4(), Tier::Paid);
        let pending_id = pending.id;
        store.seed_analysis(pending);

        let err = service
            .set_curation(&admin(), &[pending_id], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .set_curation(&admin(), &[Uuid::new_v4()], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_returns_ordered_entries_and_skips_deleted() {
        let store = InMemoryStore::new();
        let service = service(&store);
        let completed = seed_completed(&store, 3);

        service
            .set_curation(&admin(), &[completed[1], completed[0]], &[completed[2]])
            .await
            .unwrap();

        let home = service.list(CurationList::Home).await.unwrap();
        assert_eq!(
            home.iter().map(|e| e.analysis_id).collect::<Vec<_>>(),
            vec![completed[1], completed[0]]
        );
        assert!(home[0].overall_score.is_some());
        assert!(home[0].asset_url.is_some());

        store.soft_delete(completed[2]).await.unwrap();
        assert!(service.list(CurationList::Gallery).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_admin_is_forbidden() {
        let store = InMemoryStore::new();
        let member = Requester {
            account_id: Uuid::new_v4(),
            is_admin: false,
        };
        let err = service(&store)
            .set_curation(&member, &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
