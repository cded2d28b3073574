//! The order store backing every `OrderManagement` operation.

use crate::server::ids::IdSource;
use parking_lot::RwLock;
use shipstream_tonic_core::proto::orders::Order;
use shipstream_tonic_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Orders keyed by identifier, with insertion order preserved so that
/// search results are stable across calls while the store is unmodified.
pub struct OrderStore {
    ids: Arc<dyn IdSource>,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<String, Order>,
    // Identifiers in first-insert order; search iterates this, not the map.
    insertion: Vec<String>,
}

impl OrderStore {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self {
            ids,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Stores an order and returns the identifier it was filed under.
    ///
    /// An empty incoming id gets a fresh one assigned; a known id is an
    /// upsert that keeps the order's original position in insertion order.
    /// Never fails.
    pub fn insert(&self, mut order: Order) -> String {
        if order.id.is_empty() {
            order.id = self.ids.fresh_id();
        }
        let id = order.id.clone();

        let mut inner = self.inner.write();
        if !inner.orders.contains_key(&id) {
            inner.insertion.push(id.clone());
        }
        inner.orders.insert(id.clone(), order);
        id
    }

    /// Looks up a single order by identifier.
    pub fn get(&self, id: &str) -> Result<Order> {
        self.inner
            .read()
            .orders
            .get(id)
            .cloned()
            .ok_or_else(|| Error::OrderNotFound { id: id.to_string() })
    }

    /// Returns every order whose items or destination contain `query`, in
    /// insertion order. One-shot snapshot; later store writes are not
    /// reflected in an already-returned result.
    pub fn search(&self, query: &str) -> Vec<Order> {
        let inner = self.inner.read();
        inner
            .insertion
            .iter()
            .filter_map(|id| inner.orders.get(id))
            .filter(|order| {
                order.items.iter().any(|item| item.contains(query))
                    || order.destination.contains(query)
            })
            .cloned()
            .collect()
    }

    /// Loads the demo data set and returns how many orders were written.
    pub fn seed_demo_orders(&self) -> usize {
        let samples: [(&str, &[&str], &str, f32); 5] = [
            ("102", &["Google Pixel 3A", "Mac Book Pro"], "Mountain View, CA", 1800.00),
            ("103", &["Apple Watch S4"], "San Jose, CA", 400.00),
            ("104", &["Google Home Mini", "Google Nest Hub"], "Mountain View, CA", 400.00),
            ("105", &["Amazon Echo"], "San Jose, CA", 30.00),
            ("106", &["Amazon Echo", "Apple iPhone XS"], "Mountain View, CA", 300.00),
        ];
        for (id, items, destination, price) in &samples {
            self.insert(Order {
                id: (*id).to_string(),
                items: items.iter().map(|s| (*s).to_string()).collect(),
                description: String::new(),
                price: *price,
                destination: (*destination).to_string(),
            });
        }
        samples.len()
    }
}
