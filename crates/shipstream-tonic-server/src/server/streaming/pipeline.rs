//! Drives one `ProcessOrders` call from inbound identifiers to outbound
//! shipments.

use super::aggregator::ShipmentAggregator;
use crate::server::store::orders::OrderStore;
use shipstream_tonic_core::Error;
use shipstream_tonic_core::proto::orders::{CombinedShipment, ProcessOrdersRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Pulls order identifiers off the inbound stream, resolves each against the
/// store, and forwards combined shipments to the response channel as soon as
/// groups fill.
///
/// A call moves through three phases. While the inbound side is open,
/// identifiers are handled strictly one at a time and a filled group's
/// shipment is sent immediately, overlapping with further input. When the
/// client half-closes, every remaining group is flushed in first-observed
/// destination order and the response channel closes behind it. A client
/// abort or a cancelled `shutdown` token ends the call at once, dropping
/// pending groups without a flush.
///
/// Unresolvable identifiers are skipped with a warning rather than failing
/// the stream; the pipeline favors forward progress over completeness.
pub async fn run_order_pipeline<S>(
    mut inbound: S,
    store: Arc<OrderStore>,
    mut aggregator: ShipmentAggregator,
    resp_tx: mpsc::Sender<Result<CombinedShipment, Status>>,
    shutdown: CancellationToken,
) -> shipstream_tonic_core::Result<()>
where
    S: Stream<Item = Result<ProcessOrdersRequest, Status>> + Unpin,
{
    loop {
        let next = tokio::select! {
            // Checked first so a shutdown wins over buffered input.
            biased;
            () = shutdown.cancelled() => {
                tracing::debug!(
                    "Shutdown cancelled stream with {} pending orders",
                    aggregator.pending_orders()
                );
                // Best effort to tell the client; it may already be gone.
                if resp_tx.send(Err(Error::ServiceShutdown.into())).await.is_err() {
                    tracing::warn!("Failed to forward shutdown error to client");
                }
                return Err(Error::ServiceShutdown);
            }
            next = inbound.next() => next,
        };

        match next {
            Some(Ok(req)) => {
                let order = match store.get(&req.order_id) {
                    Ok(order) => order,
                    Err(_) => {
                        tracing::warn!("Skipping unresolvable order id {:?}", req.order_id);
                        continue;
                    }
                };

                if let Some(shipment) = aggregator.offer(order) {
                    tracing::debug!(
                        "Shipping {} -> {} orders",
                        shipment.id,
                        shipment.orders.len()
                    );
                    forward(&resp_tx, shipment).await?;
                }
            }
            Some(Err(status)) => {
                tracing::debug!(
                    "Client aborted stream ({status}); dropping {} pending orders",
                    aggregator.pending_orders()
                );
                return Err(Error::RequestCancelled);
            }
            // Clean half-close: drain below.
            None => break,
        }
    }

    for shipment in aggregator.finish() {
        tracing::debug!("Flushing {} -> {} orders", shipment.id, shipment.orders.len());
        forward(&resp_tx, shipment).await?;
    }

    Ok(())
}

async fn forward(
    resp_tx: &mpsc::Sender<Result<CombinedShipment, Status>>,
    shipment: CombinedShipment,
) -> shipstream_tonic_core::Result<()> {
    resp_tx
        .send(Ok(shipment))
        .await
        .map_err(|e| Error::ChannelError {
            context: format!("Failed to forward shipment: {e}"),
        })
}
