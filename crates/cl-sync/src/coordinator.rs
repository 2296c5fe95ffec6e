use cl_chunk::{concat_results, download_after_cursor, upload_in_chunks};
use cl_ledger::KeyedLocks;
use cl_store::{Cursor, Direction, Filter};
use cl_types::Change;
use tracing::{info, warn};

use crate::error::SyncResult;
use crate::replica::Replica;
use crate::types::{BulkResult, DiffResult, ReplicateOptions, ReplicationReport, Update};
use crate::watermark::{Watermark, WatermarkStore};

/// Runs replication passes and remembers how far each pair has got.
///
/// At most one pass per (source, target, model) is in flight; passes for
/// different pairs run concurrently.
#[derive(Debug)]
pub struct ReplicationCoordinator {
    watermarks: WatermarkStore,
    passes: KeyedLocks,
}

impl ReplicationCoordinator {
    pub fn new(watermarks: WatermarkStore) -> Self {
        Self {
            watermarks,
            passes: KeyedLocks::new(),
        }
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    /// Replicate `model` from `source` to `target`.
    ///
    /// Both sides must track `model`. The source is then sealed by opening a
    /// new checkpoint; every change at or below the previous one and above
    /// the stored watermark is read page by page in `(checkpoint, id)`
    /// order, then diffed and applied in chunks. Local edits made while the
    /// pass runs move their change past the seal and go in the next pass. Conflicts are returned, never applied. The
    /// watermark only moves past conflicted changes when `options.force` is
    /// set, so an interrupted or conflicted pass is retried from where it
    /// left off.
    pub async fn replicate(
        &self,
        source: &dyn Replica,
        target: &dyn Replica,
        model: &str,
        options: &ReplicateOptions,
    ) -> SyncResult<ReplicationReport> {
        let pair = WatermarkStore::key(source.id(), target.id(), model);
        let _pass = self.passes.lock(&pair).await;

        source.ensure_tracked(model).await?;
        target.ensure_tracked(model).await?;
        let since = self.watermarks.get(source.id(), target.id(), model).await?;
        let sealed = source
            .checkpoint(Some(target.id().to_string()))
            .await?
            .saturating_sub(1);
        info!(%pair, since = since.source_since, sealed, "replication started");

        let chunk_size = options.chunk_size;
        let filter = Filter::new()
            .gt("checkpoint", since.source_since)
            .lte("checkpoint", sealed)
            .order_by("checkpoint", Direction::Asc);
        let changes: Vec<Change> = download_after_cursor(
            &filter,
            chunk_size,
            |change: &Change| Cursor::new(vec![change.checkpoint.into()], change.id.to_string()),
            move |page| async move { source.changes(model, &page).await },
        )
        .await?;

        let diff: DiffResult = upload_in_chunks(changes, chunk_size, move |chunk| async move {
            target.diff(model, since.target_since, chunk).await
        })
        .await?;
        let updates: Vec<Update> = upload_in_chunks(diff.deltas, chunk_size, move |chunk| async move {
            source.create_updates(model, chunk).await
        })
        .await?;
        let bulk: BulkResult = upload_in_chunks(updates, chunk_size, move |chunk| async move {
            target.bulk_update(model, chunk).await
        })
        .await?;

        let target_checkpoint = target.checkpoint(Some(source.id().to_string())).await?;
        let conflicts = concat_results(diff.conflicts, bulk.conflicts);
        for conflict in &conflicts {
            warn!(%pair, %conflict, "replication conflict");
        }

        let watermark = if conflicts.is_empty() || options.force {
            Watermark {
                source_since: sealed,
                target_since: target_checkpoint,
            }
        } else {
            let retry_from = conflicts
                .iter()
                .map(|c| c.source_change.checkpoint.saturating_sub(1))
                .min()
                .unwrap_or(sealed);
            Watermark {
                source_since: retry_from.max(since.source_since),
                target_since: since.target_since,
            }
        };
        self.watermarks
            .put(source.id(), target.id(), model, watermark)
            .await?;

        info!(
            %pair,
            applied = bulk.applied.len(),
            conflicts = conflicts.len(),
            source_since = watermark.source_since,
            "replication finished"
        );
        Ok(ReplicationReport {
            conflicts,
            applied: bulk.applied.len(),
            since: since.source_since,
            sealed,
            watermark,
            target_checkpoint,
        })
    }
}
