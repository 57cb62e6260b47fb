#![cfg(feature = "rusqlite")]
#![allow(dead_code)]

use graphfetch::prelude::*;
use graphfetch::sqlite::{FromSqliteRow, SqliteContext, SqliteSession};
use rusqlite::Connection;

const SCHEMA: &str = "
    CREATE TABLE customers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        region TEXT NOT NULL
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customers(id),
        status TEXT NOT NULL
    );
    CREATE TABLE line_items (
        id INTEGER PRIMARY KEY,
        order_id INTEGER NOT NULL REFERENCES orders(id),
        sku TEXT NOT NULL,
        quantity INTEGER NOT NULL
    );
";

#[derive(Debug)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub orders: Lazy<Vec<PurchaseOrder>>,
}

#[derive(Debug)]
pub struct PurchaseOrder {
    pub id: i64,
    pub customer_id: i64,
    pub status: String,
    pub customer: Lazy<Option<Customer>>,
    pub items: Lazy<Vec<LineItem>>,
}

#[derive(Debug)]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    pub sku: String,
    pub quantity: i64,
}

impl Entity for Customer {
    fn entity_name(&self) -> &str {
        Self::ENTITY_NAME
    }

    fn identity(&self) -> Key {
        Key::Integer(self.id)
    }

    fn property(&self, name: &str) -> Result<&dyn Association, PropertyError> {
        match name {
            "orders" => Ok(&self.orders),
            "id" | "name" | "region" => Err(PropertyError::not_an_association(Self::ENTITY_NAME, name)),
            _ => Err(PropertyError::missing(Self::ENTITY_NAME, name)),
        }
    }
}

impl Persistent for Customer {
    const ENTITY_NAME: &'static str = "Customer";
}

impl FromSqliteRow for Customer {
    fn from_row(row: &rusqlite::Row<'_>, ctx: &SqliteContext) -> rusqlite::Result<Self> {
        let id: i64 = row.get("id")?;
        Ok(Self {
            id,
            name: row.get("name")?,
            region: row.get("region")?,
            orders: ctx.lazy_collection(Self::ENTITY_NAME, "orders", Key::Integer(id)),
        })
    }
}

impl Entity for PurchaseOrder {
    fn entity_name(&self) -> &str {
        Self::ENTITY_NAME
    }

    fn identity(&self) -> Key {
        Key::Integer(self.id)
    }

    fn property(&self, name: &str) -> Result<&dyn Association, PropertyError> {
        match name {
            "customer" => Ok(&self.customer),
            "items" => Ok(&self.items),
            _ => Err(PropertyError::missing(Self::ENTITY_NAME, name)),
        }
    }
}

impl Persistent for PurchaseOrder {
    const ENTITY_NAME: &'static str = "PurchaseOrder";
}

impl FromSqliteRow for PurchaseOrder {
    fn from_row(row: &rusqlite::Row<'_>, ctx: &SqliteContext) -> rusqlite::Result<Self> {
        let id: i64 = row.get("id")?;
        let customer_id: i64 = row.get("customer_id")?;
        Ok(Self {
            id,
            customer_id,
            status: row.get("status")?,
            customer: ctx.lazy_reference(Self::ENTITY_NAME, "customer", Some(Key::Integer(customer_id))),
            items: ctx.lazy_collection(Self::ENTITY_NAME, "items", Key::Integer(id)),
        })
    }
}

impl Entity for LineItem {
    fn entity_name(&self) -> &str {
        Self::ENTITY_NAME
    }

    fn identity(&self) -> Key {
        Key::Integer(self.id)
    }

    fn property(&self, name: &str) -> Result<&dyn Association, PropertyError> {
        Err(PropertyError::missing(Self::ENTITY_NAME, name))
    }
}

impl Persistent for LineItem {
    const ENTITY_NAME: &'static str = "LineItem";
}

impl FromSqliteRow for LineItem {
    fn from_row(row: &rusqlite::Row<'_>, _: &SqliteContext) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            order_id: row.get("order_id")?,
            sku: row.get("sku")?,
            quantity: row.get("quantity")?,
        })
    }
}

pub fn metadata() -> MetadataRegistry {
    MetadataRegistry::builder()
        .entity(
            EntityMapping::new("Customer", "customers").one_to_many(
                "orders",
                "PurchaseOrder",
                "customer_id",
            ),
        )
        .entity(
            EntityMapping::new("PurchaseOrder", "orders")
                .many_to_one("customer", "Customer", "customer_id")
                .one_to_many("items", "LineItem", "order_id"),
        )
        .entity(
            EntityMapping::new("LineItem", "line_items").many_to_one(
                "order",
                "PurchaseOrder",
                "order_id",
            ),
        )
        .build()
}

/// Seeds `customers` customers with `orders` orders each and `items` line
/// items per order.
///
/// Customer `n` is named `customer-NN` and lives in `EU` when `n` is odd,
/// `US` otherwise. The first order of each customer is `OPEN`, the others
/// `SHIPPED`. Line item `k` of an order has quantity `k`.
pub fn seed(conn: &Connection, customers: i64, orders: i64, items: i64) {
    let mut order_id = 0;
    let mut item_id = 0;
    for c in 1..=customers {
        let region = if c % 2 == 1 { "EU" } else { "US" };
        conn.execute(
            "INSERT INTO customers (id, name, region) VALUES (?1, ?2, ?3)",
            rusqlite::params![c, format!("customer-{c:02}"), region],
        )
        .expect("Failed to insert customer");
        for o in 1..=orders {
            order_id += 1;
            let status = if o == 1 { "OPEN" } else { "SHIPPED" };
            conn.execute(
                "INSERT INTO orders (id, customer_id, status) VALUES (?1, ?2, ?3)",
                rusqlite::params![order_id, c, status],
            )
            .expect("Failed to insert order");
            for k in 1..=items {
                item_id += 1;
                conn.execute(
                    "INSERT INTO line_items (id, order_id, sku, quantity) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![item_id, order_id, format!("SKU-{order_id}-{k}"), k],
                )
                .expect("Failed to insert line item");
            }
        }
    }
}

pub fn setup_session(customers: i64, orders: i64, items: i64) -> SqliteSession {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch(SCHEMA).expect("Failed to create tables");
    seed(&conn, customers, orders, items);
    SqliteSession::new(conn, metadata())
}

pub fn ids<E: Entity>(rows: &[E]) -> Vec<Key> {
    rows.iter().map(Entity::identity).collect()
}
