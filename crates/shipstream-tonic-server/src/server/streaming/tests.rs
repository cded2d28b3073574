use super::aggregator::ShipmentAggregator;
use super::pipeline::run_order_pipeline;
use crate::server::ids::testing::SeqSource;
use crate::server::store::orders::OrderStore;
use shipstream_tonic_core::Error;
use shipstream_tonic_core::proto::orders::{CombinedShipment, Order, ProcessOrdersRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::Status;

fn order(id: &str, destination: &str) -> Order {
    Order {
        id: id.to_string(),
        items: vec![format!("Item {id}")],
        description: String::new(),
        price: 25.0,
        destination: destination.to_string(),
    }
}

fn aggregator(batch_size: usize) -> ShipmentAggregator {
    ShipmentAggregator::new(batch_size, Arc::new(SeqSource::default()))
}

fn shipped_ids(shipment: &CombinedShipment) -> Vec<&str> {
    shipment.orders.iter().map(|o| o.id.as_str()).collect()
}

#[test]
fn full_group_emits_immediately() {
    let mut agg = aggregator(3);
    assert!(agg.offer(order("a", "SJ")).is_none());
    assert!(agg.offer(order("b", "SJ")).is_none());

    let shipment = agg
        .offer(order("c", "SJ"))
        .expect("third order fills the group");
    assert_eq!(shipment.destination, "SJ");
    assert_eq!(shipped_ids(&shipment), ["a", "b", "c"]);
    assert_eq!(shipment.status, "Processed");
    assert!(shipment.id.starts_with("cmb-"));

    assert!(agg.finish().is_empty());
}

#[test]
fn full_batches_cover_the_input_exactly_once() {
    let mut agg = aggregator(3);
    let mut shipments = Vec::new();
    for i in 0..6 {
        if let Some(s) = agg.offer(order(&format!("o{i}"), "SJ")) {
            shipments.push(s);
        }
    }
    shipments.extend(agg.finish());

    assert_eq!(shipments.len(), 2);
    assert!(shipments.iter().all(|s| s.orders.len() == 3));
    assert_ne!(shipments[0].id, shipments[1].id);

    let all: Vec<_> = shipments
        .iter()
        .flat_map(|s| s.orders.iter().map(|o| o.id.as_str()))
        .collect();
    assert_eq!(all, ["o0", "o1", "o2", "o3", "o4", "o5"]);
}

#[test]
fn partial_group_flushes_on_finish() {
    let mut agg = aggregator(3);
    assert!(agg.offer(order("a", "MV")).is_none());
    assert!(agg.offer(order("b", "MV")).is_none());
    assert_eq!(agg.pending_orders(), 2);

    let flushed = agg.finish();
    assert_eq!(flushed.len(), 1);
    assert_eq!(shipped_ids(&flushed[0]), ["a", "b"]);
}

#[test]
fn empty_aggregator_flushes_nothing() {
    assert!(aggregator(3).finish().is_empty());
}

#[test]
fn mixed_destinations_follow_the_demo_scenario() {
    // A(SJ), B(SJ), C(MV), D(SJ) with threshold 3: SJ fills when D arrives,
    // MV flushes at stream end. Two shipments, four orders, each once.
    let mut agg = aggregator(3);
    assert!(agg.offer(order("A", "SJ")).is_none());
    assert!(agg.offer(order("B", "SJ")).is_none());
    assert!(agg.offer(order("C", "MV")).is_none());

    let sj = agg.offer(order("D", "SJ")).expect("SJ fills on its third order");
    assert_eq!(sj.destination, "SJ");
    assert_eq!(shipped_ids(&sj), ["A", "B", "D"]);

    let rest = agg.finish();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].destination, "MV");
    assert_eq!(shipped_ids(&rest[0]), ["C"]);
}

#[test]
fn flush_order_follows_first_observation() {
    let mut agg = aggregator(3);
    agg.offer(order("1", "MV"));
    agg.offer(order("2", "SJ"));
    agg.offer(order("3", "MV"));

    let destinations: Vec<_> = agg
        .finish()
        .iter()
        .map(|s| s.destination.clone())
        .collect();
    assert_eq!(destinations, ["MV", "SJ"]);
}

#[test]
fn flushed_destination_starts_a_new_group() {
    let mut agg = aggregator(2);
    agg.offer(order("1", "SJ"));
    let first = agg.offer(order("2", "SJ")).expect("group of two fills");

    agg.offer(order("3", "SJ"));
    let rest = agg.finish();
    assert_eq!(rest.len(), 1);
    assert_eq!(shipped_ids(&rest[0]), ["3"]);
    assert_ne!(first.id, rest[0].id);
}

#[test]
fn duplicate_ids_are_independent_items() {
    let mut agg = aggregator(3);
    agg.offer(order("dup", "SJ"));
    agg.offer(order("dup", "SJ"));
    let s = agg.offer(order("dup", "SJ")).expect("duplicates fill a group");
    assert_eq!(shipped_ids(&s), ["dup", "dup", "dup"]);
}

#[test]
fn batch_size_one_ships_every_order() {
    let mut agg = aggregator(1);
    let s = agg.offer(order("solo", "MV")).expect("single order fills");
    assert_eq!(shipped_ids(&s), ["solo"]);
    assert!(agg.finish().is_empty());
}

fn seeded_store() -> Arc<OrderStore> {
    let store = OrderStore::new(Arc::new(SeqSource::default()));
    for (id, dest) in [("A", "SJ"), ("B", "SJ"), ("C", "MV"), ("D", "SJ")] {
        store.insert(order(id, dest));
    }
    Arc::new(store)
}

fn requests(ids: &[&str]) -> Vec<Result<ProcessOrdersRequest, Status>> {
    ids.iter()
        .map(|id| {
            Ok(ProcessOrdersRequest {
                order_id: id.to_string(),
            })
        })
        .collect()
}

async fn collect(
    rx: mpsc::Receiver<Result<CombinedShipment, Status>>,
) -> Vec<Result<CombinedShipment, Status>> {
    ReceiverStream::new(rx).collect().await
}

#[tokio::test]
async fn pipeline_emits_full_groups_then_flushes_on_close() {
    let inbound = tokio_stream::iter(requests(&["A", "B", "C", "D"]));
    let (tx, rx) = mpsc::channel(8);

    run_order_pipeline(
        inbound,
        seeded_store(),
        aggregator(3),
        tx,
        CancellationToken::new(),
    )
    .await
    .expect("clean completion");

    let emitted: Vec<_> = collect(rx)
        .await
        .into_iter()
        .map(|r| r.expect("no error items"))
        .collect();
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].destination, "SJ");
    assert_eq!(shipped_ids(&emitted[0]), ["A", "B", "D"]);
    assert_eq!(emitted[1].destination, "MV");
    assert_eq!(shipped_ids(&emitted[1]), ["C"]);
}

#[tokio::test]
async fn pipeline_skips_unresolvable_ids() {
    let inbound = tokio_stream::iter(requests(&["A", "ghost", "B"]));
    let (tx, rx) = mpsc::channel(8);

    run_order_pipeline(
        inbound,
        seeded_store(),
        aggregator(3),
        tx,
        CancellationToken::new(),
    )
    .await
    .expect("unknown ids must not fail the call");

    let emitted: Vec<_> = collect(rx)
        .await
        .into_iter()
        .map(|r| r.expect("no error items"))
        .collect();
    assert_eq!(emitted.len(), 1);
    assert_eq!(shipped_ids(&emitted[0]), ["A", "B"]);
}

#[tokio::test]
async fn pipeline_empty_input_completes_immediately() {
    let inbound = tokio_stream::iter(requests(&[]));
    let (tx, rx) = mpsc::channel(8);

    run_order_pipeline(
        inbound,
        seeded_store(),
        aggregator(3),
        tx,
        CancellationToken::new(),
    )
    .await
    .expect("empty input is a clean completion");

    assert!(collect(rx).await.is_empty());
}

#[tokio::test]
async fn pipeline_abandons_groups_on_client_abort() {
    let inbound = tokio_stream::iter(vec![
        Ok(ProcessOrdersRequest {
            order_id: "A".to_string(),
        }),
        Err(Status::cancelled("client went away")),
    ]);
    let (tx, rx) = mpsc::channel(8);

    let err = run_order_pipeline(
        inbound,
        seeded_store(),
        aggregator(3),
        tx,
        CancellationToken::new(),
    )
    .await
    .expect_err("abort must not complete cleanly");
    assert!(matches!(err, Error::RequestCancelled));

    // No partial-group flush on cancellation.
    assert!(collect(rx).await.is_empty());
}

#[tokio::test]
async fn pipeline_stops_without_flush_on_shutdown() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let inbound = tokio_stream::iter(requests(&["A"]));
    let (tx, rx) = mpsc::channel(8);

    let err = run_order_pipeline(inbound, seeded_store(), aggregator(3), tx, cancel)
        .await
        .expect_err("shutdown interrupts the call");
    assert!(matches!(err, Error::ServiceShutdown));

    let msgs = collect(rx).await;
    assert_eq!(msgs.len(), 1);
    let status = msgs[0].as_ref().expect_err("only the shutdown status");
    assert_eq!(status.code(), tonic::Code::Unavailable);
}

#[tokio::test]
async fn pipeline_emits_before_input_closes() {
    let (in_tx, in_rx) = mpsc::channel(4);
    let (out_tx, mut out_rx) = mpsc::channel(4);

    let handle = tokio::spawn(run_order_pipeline(
        ReceiverStream::new(in_rx),
        seeded_store(),
        aggregator(3),
        out_tx,
        CancellationToken::new(),
    ));

    for id in ["A", "B", "D"] {
        in_tx
            .send(Ok(ProcessOrdersRequest {
                order_id: id.to_string(),
            }))
            .await
            .expect("pipeline is still reading");
    }

    // The SJ shipment must arrive while the input side is still open.
    let shipment = out_rx
        .recv()
        .await
        .expect("shipment before input closes")
        .expect("not an error item");
    assert_eq!(shipped_ids(&shipment), ["A", "B", "D"]);

    drop(in_tx);
    assert!(out_rx.recv().await.is_none());
    handle.await.expect("pipeline task").expect("clean completion");
}

#[tokio::test]
async fn pipeline_errors_when_receiver_is_dropped() {
    let inbound = tokio_stream::iter(requests(&["A", "B", "D"]));
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let err = run_order_pipeline(
        inbound,
        seeded_store(),
        aggregator(3),
        tx,
        CancellationToken::new(),
    )
    .await
    .expect_err("closed response channel surfaces");
    assert!(matches!(err, Error::ChannelError { .. }));
}
