//! gRPC service implementation for order management.
//!
//! This module defines [`OrderMgtService`], the concrete implementation of
//! the `OrderManagement` service from the protobuf specification. The unary
//! and single-direction streaming operations are thin wrappers over the
//! order store; the bidirectional `ProcessOrders` operation spawns a
//! per-call aggregation pipeline and streams combined shipments back while
//! input is still arriving.
//!
//! ## Responsibilities
//!
//! - Validate incoming orders and surface lookup failures as gRPC statuses.
//! - Construct one call-scoped aggregator per `ProcessOrders` stream.
//! - Track in-flight streams and refuse new ones during shutdown.
//! - Handle backpressure, cancellation, and graceful drain.

use crate::server::{
    config::ServerConfig,
    ids::IdSource,
    store::orders::OrderStore,
    streaming::{aggregator::ShipmentAggregator, pipeline::run_order_pipeline},
    telemetry::{
        decrement_streams_inflight, increment_orders_grouped, increment_requests,
        increment_shipments_emitted, increment_stream_errors, increment_streams_inflight,
        record_stream_duration,
    },
};
use core::pin::Pin;
use core::time::Duration;
use futures::TryStreamExt;
use shipstream_tonic_core::Error;
use shipstream_tonic_core::proto::orders::{
    AddOrderResponse, CombinedShipment, GetOrderRequest, Order, ProcessOrdersRequest,
    SearchOrdersRequest, UpdateOrdersResponse, order_management_server::OrderManagement,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};

/// Order management service covering all four gRPC call patterns.
///
/// Each `ProcessOrders` call gets its own [`ShipmentAggregator`] and response
/// channel; the only state shared across calls is the order store and the
/// shutdown coordination handles.
#[derive(Clone)]
pub struct OrderMgtService {
    config: ServerConfig,
    store: Arc<OrderStore>,
    ids: Arc<dyn IdSource>,
    accepting: Arc<AtomicBool>,
    inflight: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl OrderMgtService {
    pub fn new(config: ServerConfig, store: Arc<OrderStore>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            config,
            store,
            ids,
            accepting: Arc::new(AtomicBool::new(true)),
            inflight: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Number of `ProcessOrders` streams currently being served.
    pub fn streams_inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    /// Initiates a graceful shutdown of the order service.
    ///
    /// New streams are refused immediately; in-flight streams get up to the
    /// configured drain deadline to complete, after which the shared
    /// cancellation token abandons whatever is left (pending groups are
    /// dropped, not flushed).
    pub async fn shutdown(&self) {
        // === Phase 1: Stop accepting new streams ===
        tracing::info!("Refusing new order streams");
        self.accepting.store(false, Ordering::SeqCst);

        // === Phase 2: Wait for in-flight streams to drain ===
        tracing::info!(
            "Draining in-flight streams ({} active)",
            self.streams_inflight()
        );
        let drain = timeout(
            Duration::from_secs(self.config.shutdown_timeout_secs),
            async {
                while self.streams_inflight() > 0 {
                    sleep(Duration::from_millis(100)).await;
                }
            },
        )
        .await;

        match drain {
            Ok(()) => {
                tracing::debug!("All in-flight streams drained successfully");
            }
            Err(_) => {
                tracing::warn!(
                    "Graceful drain timed out ({} streams still active)",
                    self.streams_inflight()
                );
            }
        }

        // === Phase 3: Cancel whatever is still running ===
        tracing::debug!("Cancelling remaining streams via shutdown token");
        self.cancel.cancel();
    }
}

fn validate_order(order: &Order) -> Result<(), Error> {
    // "-1" is the demo's canonical bad identifier.
    if order.id == "-1" {
        return Err(Error::InvalidRequest {
            reason: format!("Order ID received is not valid: {}", order.id),
        });
    }
    if order.items.is_empty() {
        return Err(Error::InvalidRequest {
            reason: "Order must contain at least one item".to_string(),
        });
    }
    if !order.price.is_finite() || order.price < 0.0 {
        return Err(Error::InvalidRequest {
            reason: "Order price must be non-negative".to_string(),
        });
    }
    Ok(())
}

#[tonic::async_trait]
impl OrderManagement for OrderMgtService {
    /// Stores a new order and returns the identifier it was filed under.
    #[tracing::instrument(skip_all, fields(order_id = %req.get_ref().id))]
    async fn add_order(&self, req: Request<Order>) -> Result<Response<AddOrderResponse>, Status> {
        let order = req.into_inner();
        validate_order(&order)?;

        let id = self.store.insert(order);
        tracing::info!("Order {id} added");
        Ok(Response::new(AddOrderResponse { id }))
    }

    /// Fetches a single order, `NOT_FOUND` when absent.
    async fn get_order(&self, req: Request<GetOrderRequest>) -> Result<Response<Order>, Status> {
        let id = req.into_inner().id;
        let order = self.store.get(&id)?;
        Ok(Response::new(order))
    }

    type SearchOrdersStream = Pin<Box<dyn Stream<Item = Result<Order, Status>> + Send>>;

    /// Streams every stored order matching the query, in insertion order.
    ///
    /// The match set is snapshotted up front; results are pushed through a
    /// bounded channel so a slow client applies backpressure instead of
    /// buffering the whole set.
    #[tracing::instrument(skip_all, fields(query = %req.get_ref().query))]
    async fn search_orders(
        &self,
        req: Request<SearchOrdersRequest>,
    ) -> Result<Response<Self::SearchOrdersStream>, Status> {
        let query = req.into_inner().query;
        let matches = self.store.search(&query);
        tracing::debug!("Search {:?} matched {} orders", query, matches.len());

        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size);
        tokio::spawn(async move {
            for order in matches {
                if tx.send(Ok(order)).await.is_err() {
                    // Client stopped reading; nothing left to do.
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    /// Consumes a stream of orders, upserting each, and acknowledges once
    /// with the identifiers written.
    async fn update_orders(
        &self,
        req: Request<Streaming<Order>>,
    ) -> Result<Response<UpdateOrdersResponse>, Status> {
        let mut inbound = req.into_inner();
        let mut updated_ids = Vec::new();

        while let Some(order) = inbound.message().await? {
            validate_order(&order)?;
            let id = self.store.insert(order);
            tracing::debug!("Order {id} updated");
            updated_ids.push(id);
        }

        Ok(Response::new(UpdateOrdersResponse { updated_ids }))
    }

    type ProcessOrdersStream = Pin<Box<dyn Stream<Item = Result<CombinedShipment, Status>> + Send>>;

    /// Handles the bidirectional order aggregation stream.
    ///
    /// Spawns a per-call pipeline that resolves incoming identifiers, groups
    /// them by destination, and emits each combined shipment as soon as its
    /// group fills; remaining groups flush when the client half-closes. The
    /// response stream is backed by a bounded channel, so emission overlaps
    /// continued input.
    #[tracing::instrument(skip_all)]
    async fn process_orders(
        &self,
        req: Request<Streaming<ProcessOrdersRequest>>,
    ) -> Result<Response<Self::ProcessOrdersStream>, Status> {
        if !self.accepting.load(Ordering::SeqCst) {
            increment_stream_errors();
            return Err(Error::ServiceShutdown.into());
        }

        let start = std::time::Instant::now();
        increment_requests();
        increment_streams_inflight();
        self.inflight.fetch_add(1, Ordering::SeqCst);

        let inbound = req.into_inner();
        let aggregator = ShipmentAggregator::new(self.config.batch_size, self.ids.clone());
        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<CombinedShipment, Status>>(self.config.stream_buffer_size);

        let store = Arc::clone(&self.store);
        let cancel = self.cancel.clone();
        let inflight = Arc::clone(&self.inflight);

        let fut = async move {
            match run_order_pipeline(inbound, store, aggregator, resp_tx, cancel).await {
                Ok(()) => {
                    record_stream_duration(start.elapsed().as_millis() as f64);
                }
                Err(e) => {
                    tracing::warn!("Order pipeline ended early: {e}");
                }
            }
            inflight.fetch_sub(1, Ordering::SeqCst);
            decrement_streams_inflight();
        };
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("order_pipeline"))
        };
        tokio::spawn(fut);

        let stream = ReceiverStream::new(resp_rx)
            .inspect_ok(|shipment| {
                increment_shipments_emitted(1);
                increment_orders_grouped(shipment.orders.len() as u64);
            })
            .inspect_err(|_e| {
                increment_stream_errors();
            });

        Ok(Response::new(Box::pin(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str) -> Order {
        Order {
            id: id.to_string(),
            items: vec!["Widget".to_string()],
            description: String::new(),
            price: 10.0,
            destination: "SJ".to_string(),
        }
    }

    #[test]
    fn well_formed_order_passes_validation() {
        assert!(validate_order(&order("101")).is_ok());
    }

    #[test]
    fn sentinel_id_is_rejected() {
        assert!(matches!(
            validate_order(&order("-1")),
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[test]
    fn empty_items_are_rejected() {
        let mut bad = order("101");
        bad.items.clear();
        assert!(validate_order(&bad).is_err());
    }

    #[test]
    fn negative_or_nan_price_is_rejected() {
        let mut bad = order("101");
        bad.price = -1.0;
        assert!(validate_order(&bad).is_err());
        bad.price = f32::NAN;
        assert!(validate_order(&bad).is_err());
    }
}
