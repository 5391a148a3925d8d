//! Bounded producer/consumer fan-out shared by table providers.

use futures::future::{try_join, try_join_all};
use tdf_common::{Batch, Result, TaskContext, TdfError};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::provider::BatchCallback;

/// Feeds `partitions` to one consumer per callback over a queue bounded by
/// the number of consumers.
///
/// Each consumer turns a partition into batches with `load` and hands them
/// to its callback in order. All workers share one cancellation scope
/// derived from the task context: the first error drops the remaining work
/// and is returned.
pub async fn fan_out<'a, P, L>(
    ctx: &TaskContext,
    source: &str,
    partitions: Vec<P>,
    callbacks: Vec<BatchCallback<'a>>,
    load: L,
) -> Result<()>
where
    P: Send,
    L: Fn(P) -> Result<Vec<Batch>> + Sync,
{
    if callbacks.is_empty() {
        return Ok(());
    }
    let scope = ctx.cancellation.child_token();
    let (tx, rx) = mpsc::channel::<P>(callbacks.len());
    let rx = Mutex::new(rx);

    let producer = {
        let scope = &scope;
        async move {
            for partition in partitions {
                tokio::select! {
                    biased;
                    _ = scope.cancelled() => {
                        return Err(TdfError::Cancelled("scan producer stopped".to_string()));
                    }
                    sent = tx.send(partition) => {
                        if sent.is_err() {
                            // every consumer is gone; their error wins
                            break;
                        }
                    }
                }
            }
            Ok(())
        }
    };

    let consumers = callbacks.into_iter().enumerate().map(|(worker, mut callback)| {
        let rx = &rx;
        let scope = &scope;
        let load = &load;
        async move {
            loop {
                let partition = {
                    let mut queue = rx.lock().await;
                    tokio::select! {
                        biased;
                        _ = scope.cancelled() => {
                            return Err(TdfError::Cancelled(format!(
                                "scan worker {worker} cancelled"
                            )));
                        }
                        next = queue.recv() => next,
                    }
                };
                let Some(partition) = partition else {
                    break;
                };
                ctx.metrics().record_scan_partition(source);
                for batch in load(partition)? {
                    ctx.metrics()
                        .record_scan_batch(source, batch.num_rows() as u64);
                    callback(batch)?;
                }
            }
            debug!(source, worker, "scan worker drained");
            Ok(())
        }
    });

    let outcome = try_join(producer, try_join_all(consumers)).await;
    if outcome.is_err() {
        scope.cancel();
    }
    outcome.map(|_| ())
}
